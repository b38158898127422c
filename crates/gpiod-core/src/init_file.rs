//! Startup command file.
//!
//! Replays a file of protocol commands once before the socket opens, so
//! pins can be put into a known state at boot:
//!
//! ```text
//! # relay board
//! SETUP 11 OUT LOW
//! SETUP 16 IN PULLUP
//! ```
//!
//! Nothing in here is fatal. A missing file is skipped, rejected lines are
//! logged, and the daemon carries on.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::pin::PinController;
use crate::protocol::ProtocolParser;
use crate::protocol::command::strip_terminator;

/// A line of the init file that did not apply cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitFailure {
    /// 1-based line number.
    pub line_no: usize,
    pub line: String,
    /// The `error` response, or the hardware fault description.
    pub message: String,
}

/// Outcome of replaying an init file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Whether the file existed and could be opened.
    pub found: bool,
    pub applied: usize,
    pub skipped: usize,
    pub failures: Vec<InitFailure>,
}

impl InitReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Comment lines start with `#` in the first column; blank lines are
/// ignored too.
fn is_ignored(line: &str) -> bool {
    line.starts_with('#') || line.trim().is_empty()
}

/// Feed every command line of `path` through `parser`.
pub async fn run_init_file<C: PinController>(
    path: &Path,
    parser: &mut ProtocolParser<C>,
) -> InitReport {
    let mut report = InitReport::default();

    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No init file, skipping");
            return report;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot open init file, skipping");
            return report;
        }
    };
    report.found = true;

    let mut reader = BufReader::new(file);
    let mut raw = Vec::new();
    let mut line_no = 0;
    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(path = %path.display(), line_no = line_no + 1, error = %e, "Stopped reading init file");
                break;
            }
        }
        line_no += 1;

        // Undecodable bytes become U+FFFD and fail as an ordinary bad command.
        let line = strip_terminator(&String::from_utf8_lossy(&raw)).to_string();

        if is_ignored(&line) {
            report.skipped += 1;
            continue;
        }

        match parser.handle_line(&line) {
            Ok(response) if response.is_error() => {
                warn!(line_no, %line, %response, "Init command failed");
                report.failures.push(InitFailure {
                    line_no,
                    line,
                    message: response.to_string(),
                });
            }
            Ok(_) => report.applied += 1,
            Err(e) => {
                error!(line_no, %line, error = %e, "Hardware fault in init command");
                report.failures.push(InitFailure {
                    line_no,
                    line,
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        path = %path.display(),
        applied = report.applied,
        failed = report.failed(),
        "Init file processed"
    );
    report
}
