//! Time source used for history records and event metadata.

use chrono::{DateTime, Utc};

/// Source of "now". Tests inject a fixed instant so recorded history is
/// reproducible.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
