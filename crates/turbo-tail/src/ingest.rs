//! The stdin ingestion loop.
//!
//! Lines are echoed before they are parsed, so the terminal output stays a
//! faithful copy of the input whatever happens to the line afterwards.

use std::io::{BufRead, ErrorKind, Write};

use tail_logs::parse_line;
use tail_stream::StreamCoordinator;
use tracing::{debug, trace, warn};

/// Consecutive read failures after which the input is treated as closed.
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 16;

/// Counters for one ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines read from the input.
    pub lines: u64,
    /// Lines stored as log entries.
    pub ingested: u64,
    /// Lines that were only echoed.
    pub passed_through: u64,
    /// Read failures that were skipped.
    pub read_errors: u64,
}

/// Reads `reader` line by line until end of input.
///
/// Every line is written to `writer` unchanged, with a newline added to a
/// final unterminated line. Lines that hold a JSON object are appended to the
/// coordinator's store. Read failures are logged and skipped. If the writer
/// fails, echoing stops but ingestion carries on.
pub fn run_ingest<R, W>(
    mut reader: R,
    mut writer: W,
    coordinator: &StreamCoordinator,
) -> IngestStats
where
    R: BufRead,
    W: Write,
{
    let mut stats = IngestStats::default();
    let mut line = Vec::new();
    let mut echo = true;
    let mut consecutive_errors = 0;

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => consecutive_errors = 0,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                stats.read_errors += 1;
                consecutive_errors += 1;
                warn!(error = %e, "Failed to read input line");
                if consecutive_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                    warn!(
                        errors = consecutive_errors,
                        "Giving up on input after repeated read failures"
                    );
                    break;
                }
                continue;
            }
        }
        stats.lines += 1;

        if echo {
            if let Err(e) = echo_line(&mut writer, &line) {
                warn!(error = %e, "Failed to echo input, continuing without output");
                echo = false;
            }
        }

        let text = String::from_utf8_lossy(&line);
        match parse_line(&text) {
            Ok(raw) => {
                let id = coordinator.ingest(raw);
                trace!(id = %id, "Stored log entry");
                stats.ingested += 1;
            }
            Err(e) => {
                trace!(error = %e, "Passing line through");
                stats.passed_through += 1;
            }
        }
    }

    if echo {
        if let Err(e) = writer.flush() {
            debug!(error = %e, "Failed to flush output");
        }
    }

    stats
}

fn echo_line<W: Write>(writer: &mut W, line: &[u8]) -> std::io::Result<()> {
    writer.write_all(line)?;
    if !line.ends_with(b"\n") {
        writer.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};
    use tail_stream::StreamConfig;
    use test_case::test_case;

    fn coordinator() -> StreamCoordinator {
        StreamCoordinator::new(StreamConfig::default())
    }

    fn run(input: &str) -> (IngestStats, String, StreamCoordinator) {
        let coordinator = coordinator();
        let mut output = Vec::new();
        let stats = run_ingest(Cursor::new(input.as_bytes().to_vec()), &mut output, &coordinator);
        (stats, String::from_utf8(output).unwrap(), coordinator)
    }

    #[test]
    fn test_json_lines_are_stored_and_echoed() {
        let input = "{\"level\":\"INFO\",\"msg\":\"one\"}\n{\"level\":\"WARN\",\"msg\":\"two\"}\n";

        let (stats, output, coordinator) = run(input);

        assert_eq!(output, input);
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.ingested, 2);
        assert_eq!(coordinator.store().len(), 2);

        let stored = coordinator.store().last_n(10);
        assert_eq!(stored[0]["msg"], "one");
        assert_eq!(stored[1]["level"], "WARN");
    }

    #[test_case("plain text" ; "text")]
    #[test_case("[1,2,3]" ; "array")]
    #[test_case("42" ; "number")]
    #[test_case("{\"broken\": " ; "truncated")]
    #[test_case("" ; "blank")]
    fn test_non_object_lines_pass_through(line: &str) {
        let input = format!("{line}\n");

        let (stats, output, coordinator) = run(&input);

        assert_eq!(output, input);
        assert_eq!(stats.passed_through, 1);
        assert_eq!(stats.ingested, 0);
        assert!(coordinator.store().is_empty());
    }

    #[test]
    fn test_mixed_input_keeps_order() {
        let input = "starting up\n{\"n\":1}\r\nnot json\n{\"n\":2}\n";

        let (stats, output, coordinator) = run(input);

        assert_eq!(output, input);
        assert_eq!(
            stats,
            IngestStats {
                lines: 4,
                ingested: 2,
                passed_through: 2,
                read_errors: 0,
            }
        );
        let stored = coordinator.store().last_n(10);
        assert_eq!(stored[0]["n"], 1);
        assert_eq!(stored[1]["n"], 2);
    }

    #[test]
    fn test_final_line_without_newline() {
        let (stats, output, coordinator) = run("{\"msg\":\"last\"}");

        assert_eq!(output, "{\"msg\":\"last\"}\n");
        assert_eq!(stats.ingested, 1);
        assert_eq!(coordinator.store().len(), 1);
    }

    #[test]
    fn test_invalid_utf8_is_echoed_raw() {
        let coordinator = coordinator();
        let input = b"caf\xe9\n".to_vec();
        let mut output = Vec::new();

        let stats = run_ingest(Cursor::new(input.clone()), &mut output, &coordinator);

        assert_eq!(output, input);
        assert_eq!(stats.passed_through, 1);
    }

    /// Writer that refuses every write.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::from(ErrorKind::BrokenPipe))
        }
    }

    #[test]
    fn test_ingestion_continues_when_echo_fails() {
        let coordinator = coordinator();
        let input = "{\"n\":1}\n{\"n\":2}\n";

        let stats = run_ingest(Cursor::new(input), BrokenPipe, &coordinator);

        assert_eq!(stats.ingested, 2);
        assert_eq!(coordinator.store().len(), 2);
    }

    /// Reader that fails a set number of times before yielding its data.
    struct Flaky {
        failures: u32,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(io::Error::other("device hiccup"));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn test_read_errors_are_skipped() {
        let coordinator = coordinator();
        let reader = io::BufReader::new(Flaky {
            failures: 2,
            inner: Cursor::new(b"{\"n\":1}\n".to_vec()),
        });

        let stats = run_ingest(reader, io::sink(), &coordinator);

        assert_eq!(stats.read_errors, 2);
        assert_eq!(stats.ingested, 1);
    }

    #[test]
    fn test_persistent_read_errors_end_ingestion() {
        let coordinator = coordinator();
        let reader = io::BufReader::new(Flaky {
            failures: u32::MAX,
            inner: Cursor::new(Vec::new()),
        });

        let stats = run_ingest(reader, io::sink(), &coordinator);

        assert_eq!(stats.read_errors, u64::from(MAX_CONSECUTIVE_READ_ERRORS));
        assert_eq!(stats.lines, 0);
    }

    #[test]
    fn test_ingested_entries_reach_viewers_once() {
        let (_, _, coordinator) = run("{\"level\":\"INFO\"}\n");

        let (_id, mut rx) = coordinator.connect();
        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.kind(), "set_logs");
        assert_eq!(rx.try_recv().unwrap().kind(), "set_status");

        assert_eq!(coordinator.flush(), 1);
        assert!(rx.try_recv().is_err());
    }
}
