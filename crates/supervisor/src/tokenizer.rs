//! Pipe tokenizer: child bytes to lines

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

use outputs::OutputSet;

/// Read `reader` to its end, sinking every complete line to `outputs`
///
/// Lines are split on `\n`; the terminator and a `\r` right before it are
/// stripped. A trailing fragment without `\n` is dropped. Returns the number
/// of lines sunk.
pub async fn drain_lines<R: AsyncRead + Unpin>(reader: R, outputs: &OutputSet) -> u64 {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let Some(line) = strip_terminator(&buf) else {
                    debug!(bytes = buf.len(), "Discarding unterminated final line");
                    break;
                };
                outputs.sink(&Bytes::copy_from_slice(line));
                count += 1;
            }
            Err(e) => {
                debug!(error = %e, "Pipe read failed");
                break;
            }
        }
    }

    count
}

fn strip_terminator(buf: &[u8]) -> Option<&[u8]> {
    let line = buf.strip_suffix(b"\n")?;
    Some(line.strip_suffix(b"\r").unwrap_or(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockOutput;

    #[tokio::test]
    async fn test_splits_and_strips_terminators() {
        let (output, captured) = MockOutput::new();
        let set = OutputSet::new(vec![Box::new(output)]);

        let input: &[u8] = b"one\ntwo\r\n\nthree\r\r\npartial";
        let count = drain_lines(input, &set).await;

        assert_eq!(count, 4);
        assert_eq!(
            captured.lines(),
            vec![
                Bytes::from("one"),
                Bytes::from("two"),
                Bytes::from(""),
                Bytes::from("three\r"),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_stream_sinks_nothing() {
        let (output, captured) = MockOutput::new();
        let set = OutputSet::new(vec![Box::new(output)]);

        assert_eq!(drain_lines(&b""[..], &set).await, 0);
        assert!(captured.lines().is_empty());
    }

    #[test]
    fn test_strip_terminator() {
        assert_eq!(strip_terminator(b"a\r\n"), Some(&b"a"[..]));
        assert_eq!(strip_terminator(b"\r\n"), Some(&b""[..]));
        assert_eq!(strip_terminator(b"a\r"), None);
    }
}
