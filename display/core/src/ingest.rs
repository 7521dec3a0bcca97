//! Ingestion Loop
//!
//! Reads command lines from an async byte stream, parses them and posts the
//! resulting commands to the dispatcher. The loop only ever waits on the
//! reader or on the dispatcher channel, never on display state.
//!
//! Bad input never stops ingestion: lines that are not UTF-8 or fail to
//! parse are logged and skipped. The loop ends at end-of-stream, or early
//! if the dispatcher has gone away.

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::command::parse_line;
use crate::dispatcher::DisplayHandle;

/// Errors that stop ingestion
#[derive(Debug, Error)]
pub enum IngestError {
    /// Reading the input stream failed
    #[error("failed to read command stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters reported when ingestion ends
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines read, including blank and rejected ones
    pub lines: u64,
    /// Commands handed to the dispatcher
    pub commands: u64,
    /// Lines dropped for bad encoding or grammar
    pub rejected: u64,
    /// Blank or whitespace-only lines
    pub blank: u64,
}

/// Feed every line of `reader` to the dispatcher
///
/// Lines are terminated by `\n`; a trailing `\r` is stripped as well. A final
/// line without terminator is still processed.
///
/// # Errors
///
/// Returns [`IngestError::Io`] if the reader fails. Parse failures are not
/// errors.
pub async fn ingest<R>(mut reader: R, handle: &DisplayHandle) -> Result<IngestStats, IngestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IngestStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            tracing::info!(
                lines = stats.lines,
                commands = stats.commands,
                rejected = stats.rejected,
                "Command stream ended"
            );
            return Ok(stats);
        }
        stats.lines += 1;

        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                stats.rejected += 1;
                tracing::warn!(line_no = stats.lines, error = %e, "Skipping line that is not UTF-8");
                continue;
            }
        };

        if line.trim().is_empty() {
            stats.blank += 1;
            continue;
        }

        let commands = match parse_line(line) {
            Ok(commands) => commands,
            Err(e) => {
                stats.rejected += 1;
                tracing::warn!(line_no = stats.lines, error = %e, "Rejected command line");
                continue;
            }
        };

        for command in commands {
            if handle.apply(command).await.is_err() {
                tracing::warn!(
                    line_no = stats.lines,
                    "Dispatcher stopped, abandoning command stream"
                );
                return Ok(stats);
            }
            stats.commands += 1;
        }
    }
}
