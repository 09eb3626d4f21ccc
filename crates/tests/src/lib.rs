//! # Integration Tests
//!
//! End-to-end runs of real child processes through the supervisor.
//!
//! Covers:
//! - Lines reaching file and network outputs
//! - Start failures and abnormal exits being reported
//! - Relayed signals classified as expected
//! - Burst output delivered without loss

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_default_buffer_size() {
        assert_eq!(contracts::DEFAULT_BUFFER_SIZE, 10240);
        assert_eq!(contracts::RunConfig::default().buffer_size, 10240);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{OutputConfig, TokenTcpConfig};
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    use outputs::OutputSet;
    use supervisor::{MockErrorHandler, SignalSource, Supervisor};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::signal::unix::{signal, SignalKind};
    use tokio::sync::mpsc;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    async fn file_outputs(path: &Path) -> OutputSet {
        let configs = vec![OutputConfig::File {
            path: path.to_path_buf(),
        }];
        OutputSet::from_configs(&configs, 64).await.unwrap()
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap_or_default()
    }

    /// Three lines, clean exit: the file holds exactly those lines
    #[tokio::test]
    async fn test_e2e_clean_exit_delivers_lines_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let (handler, records) = MockErrorHandler::new();

        let status = Supervisor::new(
            sh("echo one; echo two; echo three"),
            file_outputs(&log).await,
            vec![Box::new(handler)],
        )
        .with_signal_source(SignalSource::Disabled)
        .run()
        .await;

        assert_eq!(status, 0);
        assert_eq!(read(&log), "one\ntwo\nthree\n");
        assert!(records.is_empty());
    }

    /// Nonexistent program: one synthetic line, one report, non-zero status
    #[tokio::test]
    async fn test_e2e_start_failure_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let (handler, records) = MockErrorHandler::new();

        let status = Supervisor::new(
            vec!["/nonexistent/drainrun-test-binary".to_string()],
            file_outputs(&log).await,
            vec![Box::new(handler)],
        )
        .run()
        .await;

        assert_eq!(status, 1);

        let content = read(&log);
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1, "{content}");
        assert!(lines[0].starts_with("Unable to start process: "), "{content}");

        let records = records.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].description.starts_with("unable to start process: "));
        assert_eq!(records[0].command, vec!["/nonexistent/drainrun-test-binary"]);
    }

    /// Killed by the signal the supervisor relayed: expected, nothing reported
    #[tokio::test]
    async fn test_e2e_relayed_signal_is_expected() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let (handler, records) = MockErrorHandler::new();
        let (signal_tx, signal_rx) = mpsc::channel(4);

        // Queued until the relay starts with the child
        signal_tx.send(Signal::SIGTERM).await.unwrap();

        let status = tokio::time::timeout(
            Duration::from_secs(10),
            Supervisor::new(
                sh("exec sleep 30"),
                file_outputs(&log).await,
                vec![Box::new(handler)],
            )
            .with_signal_source(SignalSource::Channel(signal_rx))
            .run(),
        )
        .await
        .expect("child was not terminated");

        assert_eq!(status, 128 + Signal::SIGTERM as i32);
        assert_eq!(read(&log), "");
        assert!(records.is_empty());
    }

    /// A signal delivered to this process is forwarded to the child
    #[tokio::test]
    async fn test_e2e_os_signal_is_relayed_and_expected() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let (handler, records) = MockErrorHandler::new();

        // Keeps SIGUSR2 from terminating the test process before the relay
        // has registered its own listener
        let _usr2 = signal(SignalKind::user_defined2()).unwrap();

        let sender = tokio::spawn(async {
            loop {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let _ = kill(Pid::this(), Signal::SIGUSR2);
            }
        });

        let status = tokio::time::timeout(
            Duration::from_secs(10),
            Supervisor::new(
                sh("exec sleep 30"),
                file_outputs(&log).await,
                vec![Box::new(handler)],
            )
            .run(),
        )
        .await
        .expect("child was not terminated");
        sender.abort();

        assert_eq!(status, 128 + Signal::SIGUSR2 as i32);
        assert_eq!(read(&log), "");
        assert!(records.is_empty());
    }

    /// Death by a signal nobody relayed is abnormal
    #[tokio::test]
    async fn test_e2e_unrelayed_signal_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let (handler, records) = MockErrorHandler::new();

        let status = Supervisor::new(
            sh("echo going down; kill -KILL $$"),
            file_outputs(&log).await,
            vec![Box::new(handler)],
        )
        .with_signal_source(SignalSource::Disabled)
        .run()
        .await;

        assert_eq!(status, 137);
        assert_eq!(
            read(&log),
            "going down\nProcess exited abnormally: signal: SIGKILL\n"
        );
        assert_eq!(records.records()[0].description, "signal: SIGKILL");
    }

    /// Both pipes reach the outputs, CRLF is stripped, unterminated tail dropped
    #[tokio::test]
    async fn test_e2e_both_pipes_and_terminators() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");

        let status = Supervisor::new(
            sh("printf 'dos\\r\\n'; echo err >&2; printf 'tail'"),
            file_outputs(&log).await,
            Vec::new(),
        )
        .with_signal_source(SignalSource::Disabled)
        .run()
        .await;

        assert_eq!(status, 0);
        let content = read(&log);
        let mut lines: Vec<&str> = content.lines().collect();
        lines.sort_unstable();
        assert_eq!(lines, vec!["dos", "err"]);
    }

    /// Lines framed with the token reach a TCP endpoint
    #[tokio::test]
    async fn test_e2e_token_tcp_delivery() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let configs = vec![OutputConfig::TokenTcp(TokenTcpConfig::new(format!(
            "tcp://127.0.0.1:{port}/abc"
        )))];
        let outputs = OutputSet::from_configs(&configs, 64).await.unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).await.unwrap();
            received
        });

        let status = Supervisor::new(sh("echo x; echo y"), outputs, Vec::new())
            .with_signal_source(SignalSource::Disabled)
            .run()
            .await;

        assert_eq!(status, 0);
        assert_eq!(server.await.unwrap(), "abc x\nabc y\n");
    }

    /// An unreachable endpoint never holds the child back
    #[tokio::test]
    async fn test_e2e_unreachable_output_does_not_block_child() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let configs = vec![
            OutputConfig::TokenTcp(TokenTcpConfig::new(format!("tcp://127.0.0.1:{port}/tok"))),
            OutputConfig::File { path: log.clone() },
        ];
        let outputs = OutputSet::from_configs(&configs, 16).await.unwrap();

        let status = tokio::time::timeout(
            Duration::from_secs(20),
            Supervisor::new(sh("seq 1 500"), outputs, Vec::new())
                .with_signal_source(SignalSource::Disabled)
                .run(),
        )
        .await
        .expect("supervisor blocked on an unreachable output");

        assert_eq!(status, 0);
        assert_eq!(read(&log).lines().last(), Some("500"));
    }

    /// Output produced in one burst reaches the file complete and in order
    #[tokio::test]
    async fn test_e2e_burst_output_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("out.log");
        let configs = vec![OutputConfig::File { path: log.clone() }];
        let outputs = OutputSet::from_configs(&configs, contracts::DEFAULT_BUFFER_SIZE)
            .await
            .unwrap();

        let status = Supervisor::new(sh("seq 1 10000"), outputs, Vec::new())
            .with_signal_source(SignalSource::Disabled)
            .run()
            .await;

        assert_eq!(status, 0);
        let content = read(&log);
        let lines: Vec<&str> = content.lines().collect();
        let expected: Vec<String> = (1..=10000).map(|n| n.to_string()).collect();
        assert_eq!(lines.len(), expected.len());
        assert!(lines.iter().zip(&expected).all(|(l, e)| l == e));
    }

    /// Outputs built from a configuration document
    #[tokio::test]
    async fn test_e2e_from_config_document() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.log");
        let second = dir.path().join("second.log");
        let document = format!(
            r#"
buffer_size = 128

[[outputs]]
type = "file"
path = "{}"

[[outputs]]
type = "file"
path = "{}"
"#,
            first.display(),
            second.display()
        );

        let config = ConfigLoader::load_from_str(&document, ConfigFormat::Toml).unwrap();
        let outputs = OutputSet::from_configs(&config.outputs, config.buffer_size)
            .await
            .unwrap();

        let status = Supervisor::new(sh("echo fanned out; exit 2"), outputs, Vec::new())
            .with_signal_source(SignalSource::Disabled)
            .run()
            .await;

        assert_eq!(status, 2);
        for path in [first, second] {
            assert_eq!(
                read(&path),
                "fanned out\nProcess exited abnormally: exit status 2\n"
            );
        }
    }
}
