//! Position fixes and fix sources.
//!
//! The engine only ever looks at the latest fix. Sources publish into a
//! `tokio::sync::watch` channel, which keeps exactly one value and lets the
//! engine sample it at its own tick rate.
//!
//! # Line format
//!
//! [`spawn_line_source`] reads `lat,lon[,...]` lines. Blank lines and lines
//! starting with `#` are skipped; malformed lines are logged and skipped.

use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::geo::{Coordinate, CoordinateParseError};

/// One reported position sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    /// Reported position, in the positioning datum.
    pub coordinate: Coordinate,
    /// When the sample was taken.
    pub timestamp: Instant,
}

impl Fix {
    /// Create a fix stamped with the current time.
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            timestamp: Instant::now(),
        }
    }

    /// Create a fix with explicit timestamp (for testing).
    pub fn with_timestamp(coordinate: Coordinate, timestamp: Instant) -> Self {
        Self {
            coordinate,
            timestamp,
        }
    }
}

/// Sender half of the latest-fix channel.
pub type FixSender = watch::Sender<Option<Fix>>;

/// Receiver half of the latest-fix channel.
pub type FixReceiver = watch::Receiver<Option<Fix>>;

/// Create an empty latest-fix channel.
pub fn fix_channel() -> (FixSender, FixReceiver) {
    watch::channel(None)
}

/// Parse a `lat,lon[,...]` line. Extra fields (altitude, speed) are ignored.
pub fn parse_fix_line(line: &str) -> Result<Coordinate, CoordinateParseError> {
    let mut fields = line.split(',');
    let (lat, lon) = match (fields.next(), fields.next()) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return Err(CoordinateParseError::Format(line.to_string())),
    };
    format!("{},{}", lat.trim(), lon.trim()).parse()
}

/// Read fixes line by line and publish each one, pausing `pace` between
/// them.
///
/// The task ends at end of input, on cancellation, or when every receiver
/// is gone. It returns the number of fixes published.
pub fn spawn_line_source<R>(
    reader: R,
    pace: Duration,
    tx: FixSender,
    cancel: CancellationToken,
) -> JoinHandle<usize>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = reader.lines();
        let mut published = 0usize;
        let mut line_no = 0usize;

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Fix source cancelled");
                    break;
                }
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!(published, "Fix source reached end of input");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Fix source read failed");
                    break;
                }
            };
            line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            match parse_fix_line(trimmed) {
                Ok(coordinate) => {
                    if tx.send(Some(Fix::new(coordinate))).is_err() {
                        debug!("Fix receivers gone, stopping source");
                        break;
                    }
                    published += 1;
                }
                Err(e) => {
                    warn!(line = line_no, error = %e, "Skipping malformed fix");
                    continue;
                }
            }

            if !pace.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(pace) => {}
                }
            }
        }

        published
    })
}
