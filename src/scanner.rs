//! Byte-at-a-time progress scanning of worker stdout
//!
//! The worker writes progress as bare characters (dot runs, coordinate text)
//! with no newline framing, so the scanner reads exactly one byte per call;
//! buffered line reads would stall on partial output. Each byte is classified
//! as a progress tick or noise; ticks drive the [`ProgressCurve`] and fire
//! the per-tick callback synchronously in stream order.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::progress::{ProgressCurve, TICK_STEP};

/// What a finished scan observed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScanSummary {
    /// Count of classified progress ticks.
    pub ticks: u64,
    /// Percentage reported on the final tick, 0.0 if none fired.
    pub last_percent: f64,
    /// True when the scan ended on cancellation instead of end-of-stream.
    pub interrupted: bool,
}

/// A byte counts as a tick iff it belongs to the worker's progress alphabet:
/// ASCII letters, the digit `0`, ASCII whitespace, `-` and `:`. Everything
/// else is noise, including bytes that do not decode as text.
fn is_tick(byte: u8) -> bool {
    byte.is_ascii_alphabetic()
        || byte == b'0'
        || byte.is_ascii_whitespace()
        || byte == b'-'
        || byte == b':'
}

/// Drain `reader` until end-of-stream or cancellation, invoking `on_tick`
/// with the running percentage for every classified byte.
///
/// The read suspends until the worker writes or closes its end; cancellation
/// interrupts the suspended read directly. Read errors end the scan like
/// end-of-stream (logged, never escalated).
pub async fn scan<R, F>(
    mut reader: R,
    curve: &ProgressCurve,
    cancel: &CancellationToken,
    mut on_tick: F,
) -> ScanSummary
where
    R: AsyncRead + Unpin,
    F: FnMut(f64),
{
    let mut byte = [0u8; 1];
    let mut raw_total = 0.0;
    let mut summary = ScanSummary::default();

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => {
                trace!("scan interrupted by cancellation");
                summary.interrupted = true;
                break;
            }
            read = reader.read(&mut byte) => read,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                if is_tick(byte[0]) {
                    summary.ticks += 1;
                    raw_total += TICK_STEP;
                    summary.last_percent = curve.estimate(raw_total);
                    on_tick(summary.last_percent);
                }
            }
            Err(err) => {
                warn!("worker stdout read failed, treating as closed: {err}");
                break;
            }
        }
    }

    summary
}
