//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for aggregate roots that buffer the events produced by their
/// commands until the application layer persists them.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the number of events already handed off for persistence.
    fn version(&self) -> i64;

    /// Returns events produced since the last hand-off.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Marks the buffered events as handed off and clears the buffer.
    fn clear_uncommitted_events(&mut self);
}
