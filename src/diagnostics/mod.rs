//! Change reporting and counters for the control loops

use core::fmt;
use core::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

/// Counters shared by the loops, reported when the controller stops
#[derive(Debug, Default)]
pub struct Diagnostics {
    changes: AtomicU32,
    rejected: AtomicU32,
    divisor_writes: AtomicU32,
}

impl Diagnostics {
    pub const fn new() -> Self {
        Self {
            changes: AtomicU32::new(0),
            rejected: AtomicU32::new(0),
            divisor_writes: AtomicU32::new(0),
        }
    }

    /// The producer published a different text
    ///
    /// Always printed on stdout, whatever the log level.
    pub fn frequency_changed(&self, text: &str) {
        self.changes.fetch_add(1, Ordering::Relaxed);
        println!("{}", change_line(text));
        log::debug!(target: "frequency", "change #{}: {:?}", self.change_count(), text);
    }

    /// The published text was not a usable frequency; the last one is kept
    pub fn sample_rejected(&self, raw: &[u8]) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        log::debug!("keeping last frequency, got {:?}", String::from_utf8_lossy(raw));
    }

    pub fn divisor_applied(&self, hz: NonZeroU32, divisor: u32) {
        self.divisor_writes.fetch_add(1, Ordering::Relaxed);
        log::debug!("{} Hz -> clock divisor {}", hz, divisor);
    }

    pub fn change_count(&self) -> u32 {
        self.changes.load(Ordering::Relaxed)
    }

    pub fn rejected_count(&self) -> u32 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn divisor_writes(&self) -> u32 {
        self.divisor_writes.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            changes: self.change_count(),
            rejected: self.rejected_count(),
            divisor_writes: self.divisor_writes(),
        }
    }
}

/// Line printed for every change of the published text
pub fn change_line(text: &str) -> String {
    format!("Frequency is {}", text)
}

/// Snapshot of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub changes: u32,
    pub rejected: u32,
    pub divisor_writes: u32,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frequency changes, {} rejected samples, {} divisor writes",
            self.changes, self.rejected, self.divisor_writes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_line_matches_producer_format() {
        assert_eq!(change_line("440"), "Frequency is 440");
        assert_eq!(change_line(""), "Frequency is ");
    }

    #[test]
    fn counters_feed_summary() {
        let diagnostics = Diagnostics::new();
        diagnostics.frequency_changed("440");
        diagnostics.sample_rejected(b"abc");
        diagnostics.sample_rejected(b"");
        diagnostics.divisor_applied(NonZeroU32::new(440).unwrap(), 42);

        let summary = diagnostics.summary();
        assert_eq!(
            summary,
            Summary {
                changes: 1,
                rejected: 2,
                divisor_writes: 1
            }
        );
        assert_eq!(
            summary.to_string(),
            "1 frequency changes, 2 rejected samples, 1 divisor writes"
        );
    }
}
