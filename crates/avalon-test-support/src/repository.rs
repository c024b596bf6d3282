//! Test repositories: `EventRepository` doubles.

use std::sync::Mutex;

use async_trait::async_trait;
use avalon_core::error::DomainError;
use avalon_core::repository::{EventRepository, StoredEvent};
use uuid::Uuid;

/// An event repository that keeps every appended event in memory and
/// serves them back from `load_events`.
#[derive(Debug, Default)]
pub struct RecordingEventRepository {
    appended: Mutex<Vec<(Uuid, Vec<StoredEvent>)>>,
}

impl RecordingEventRepository {
    /// Creates an empty recording repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every append call, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_batches(&self) -> Vec<(Uuid, Vec<StoredEvent>)> {
        self.appended.lock().unwrap().clone()
    }

    /// Returns the event types appended for `game_id`, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn event_types(&self, game_id: Uuid) -> Vec<String> {
        self.appended
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == game_id)
            .flat_map(|(_, events)| events.iter().map(|e| e.event_type.clone()))
            .collect()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .appended
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == aggregate_id)
            .flat_map(|(_, events)| events.iter().cloned())
            .collect())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.appended
            .lock()
            .unwrap()
            .push((aggregate_id, events.to_vec()));
        Ok(())
    }
}

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("action log unavailable".into()))
    }

    async fn append_events(
        &self,
        _aggregate_id: Uuid,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("action log unavailable".into()))
    }
}
