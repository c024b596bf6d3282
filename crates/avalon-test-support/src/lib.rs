//! Shared test doubles for the Avalon session engine.

mod clock;
mod repository;
mod rng;

pub use clock::{FixedClock, fixed_clock};
pub use repository::{FailingEventRepository, RecordingEventRepository};
pub use rng::{MockRng, SequenceRng};
