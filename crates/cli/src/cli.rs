//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use contracts::OutputConfig;

/// drainrun - run a command and drain its output
#[derive(Parser, Debug)]
#[command(
    name = "drainrun",
    author,
    version,
    about = "Run a command and drain its output lines to files, syslog and TCP endpoints",
    long_about = "Runs COMMAND with stdout and stderr piped, splits both streams into lines \n\
                  and hands every line to each configured output without ever blocking \n\
                  the command. Slow outputs drop their oldest buffered lines. Signals \n\
                  received by drainrun are relayed to the command, whose exit status \n\
                  becomes drainrun's own."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, env = "DRAINRUN_VERBOSE")]
    pub verbose: u8,

    /// Suppress diagnostics except warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Diagnostic log format (diagnostics go to stderr)
    #[arg(long, value_enum, default_value = "compact", env = "DRAINRUN_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, env = "DRAINRUN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Lines each output buffers while a write is in flight [default: 10240]
    #[arg(long, env = "DRAINRUN_BUFFER_SIZE")]
    pub buffer_size: Option<usize>,

    /// Write lines to standard output
    #[arg(long)]
    pub stdout: bool,

    /// Write lines to standard error
    #[arg(long)]
    pub stderr: bool,

    /// Append lines to a file (repeatable)
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Send lines to a token-based TCP endpoint, tcp[s]://host:port/token (repeatable)
    #[arg(long = "token-based-tcp", value_name = "URL", value_parser = parse_token_tcp)]
    pub token_tcp: Vec<OutputConfig>,

    /// Send lines to the local syslog daemon (repeatable)
    #[arg(
        long = "syslog",
        value_name = "FACILITY[:TAG]",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "",
        value_parser = parse_syslog
    )]
    pub syslog: Vec<OutputConfig>,

    /// Print the resolved configuration as TOML and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Command to run, with its arguments
    #[arg(
        value_name = "COMMAND",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required_unless_present = "dry_run"
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// Outputs requested by flags, in a fixed order
    pub fn flag_outputs(&self) -> Vec<OutputConfig> {
        let mut outputs = Vec::new();
        if self.stdout {
            outputs.push(OutputConfig::Stdout);
        }
        if self.stderr {
            outputs.push(OutputConfig::Stderr);
        }
        outputs.extend(self.files.iter().map(|path| OutputConfig::File { path: path.clone() }));
        outputs.extend(self.syslog.iter().cloned());
        outputs.extend(self.token_tcp.iter().cloned());
        outputs
    }
}

fn parse_token_tcp(value: &str) -> Result<OutputConfig, String> {
    config_loader::parse_token_tcp(value).map_err(|e| e.to_string())
}

fn parse_syslog(value: &str) -> Result<OutputConfig, String> {
    config_loader::parse_syslog(value).map_err(|e| e.to_string())
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use contracts::SyslogFacility;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_command_keeps_its_own_flags() {
        let cli = Cli::try_parse_from(["drainrun", "--stdout", "ls", "-la", "--stdout"]).unwrap();
        assert!(cli.stdout);
        assert_eq!(cli.command, vec!["ls", "-la", "--stdout"]);
    }

    #[test]
    fn test_double_dash_separates_command() {
        let cli = Cli::try_parse_from(["drainrun", "--file", "out.log", "--", "-weird"]).unwrap();
        assert_eq!(cli.files, vec![PathBuf::from("out.log")]);
        assert_eq!(cli.command, vec!["-weird"]);
    }

    #[test]
    fn test_syslog_value_is_optional() {
        let cli =
            Cli::try_parse_from(["drainrun", "--syslog", "--syslog=daemon:web", "app"]).unwrap();
        assert_eq!(cli.command, vec!["app"]);

        let facilities: Vec<_> = cli
            .flag_outputs()
            .into_iter()
            .map(|o| match o {
                OutputConfig::Syslog(cfg) => (cfg.facility, cfg.tag),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            facilities,
            vec![
                (SyslogFacility::Local0, None),
                (SyslogFacility::Daemon, Some("web".to_string())),
            ]
        );
    }

    #[test]
    fn test_rejects_bad_token_url() {
        assert!(
            Cli::try_parse_from(["drainrun", "--token-based-tcp", "tcp://host:1/", "app"]).is_err()
        );
    }

    #[test]
    fn test_command_required() {
        assert!(Cli::try_parse_from(["drainrun", "--stdout"]).is_err());
        assert!(Cli::try_parse_from(["drainrun", "--stdout", "--dry-run"]).is_ok());
    }

    #[test]
    fn test_flag_outputs_order() {
        let cli = Cli::try_parse_from([
            "drainrun",
            "--token-based-tcp",
            "tcp://h:1/t",
            "--file",
            "a.log",
            "--stderr",
            "--stdout",
            "true",
        ])
        .unwrap();
        let outputs = cli.flag_outputs();
        assert_eq!(outputs[0], OutputConfig::Stdout);
        assert_eq!(outputs[1], OutputConfig::Stderr);
        assert_eq!(outputs[2], OutputConfig::File { path: PathBuf::from("a.log") });
        assert!(matches!(outputs[3], OutputConfig::TokenTcp(_)));
    }
}
