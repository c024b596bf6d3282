//! File-backed action log: one JSON-encoded `StoredEvent` per line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use avalon_core::error::DomainError;
use avalon_core::repository::{EventRepository, StoredEvent};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Appends events to a JSON-lines file. Lines are only ever added.
#[derive(Debug)]
pub struct JsonLinesEventRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesEventRepository {
    /// A log at `path`. The file is created on the first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> DomainError {
    DomainError::Infrastructure(format!("action log {}: {err}", path.display()))
}

#[async_trait]
impl EventRepository for JsonLinesEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&self.path, &err)),
        };

        let mut events = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: StoredEvent = serde_json::from_str(line).map_err(|e| {
                DomainError::Infrastructure(format!("action log line {}: {e}", idx + 1))
            })?;
            if event.aggregate_id == aggregate_id {
                events.push(event);
            }
        }
        events.sort_by_key(|e| e.sequence_number);
        Ok(events)
    }

    async fn append_events(
        &self,
        _aggregate_id: Uuid,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut buf = String::new();
        for event in events {
            let line = serde_json::to_string(event).map_err(|e| {
                DomainError::Infrastructure(format!("event serialization failed: {e}"))
            })?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| io_error(&self.path, &e))?;
        file.write_all(buf.as_bytes())
            .await
            .map_err(|e| io_error(&self.path, &e))?;
        file.flush().await.map_err(|e| io_error(&self.path, &e))
    }
}

/// Drops every event. Used when no action log is configured.
#[derive(Debug, Default)]
pub struct DiscardEventRepository;

#[async_trait]
impl EventRepository for DiscardEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(Vec::new())
    }

    async fn append_events(
        &self,
        _aggregate_id: Uuid,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(aggregate_id: Uuid, sequence_number: i64) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id,
            event_type: "session.vote_cast".to_owned(),
            payload: serde_json::json!({ "player": "Allan", "vote": "approve" }),
            sequence_number,
            correlation_id: Uuid::nil(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_load_from_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonLinesEventRepository::new(dir.path().join("absent.jsonl"));
        assert!(repo.load_events(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_appends_accumulate_and_load_filters_by_game() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonLinesEventRepository::new(dir.path().join("log.jsonl"));
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        repo.append_events(a, &[event(a, 1), event(a, 2)])
            .await
            .unwrap();
        repo.append_events(b, &[event(b, 1)]).await.unwrap();
        repo.append_events(a, &[event(a, 3)]).await.unwrap();

        let loaded = repo.load_events(a).await.unwrap();
        let sequence: Vec<i64> = loaded.iter().map(|e| e.sequence_number).collect();
        assert_eq!(sequence, vec![1, 2, 3]);
        assert_eq!(loaded[0].payload["player"], "Allan");

        let text = std::fs::read_to_string(repo.path()).unwrap();
        assert_eq!(text.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_corrupt_line_is_an_infrastructure_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();
        let repo = JsonLinesEventRepository::new(&path);

        match repo.load_events(Uuid::new_v4()).await.unwrap_err() {
            DomainError::Infrastructure(msg) => assert!(msg.contains("line 1")),
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unwritable_path_is_an_infrastructure_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonLinesEventRepository::new(dir.path().join("missing").join("log.jsonl"));
        let id = Uuid::new_v4();
        assert!(matches!(
            repo.append_events(id, &[event(id, 1)]).await,
            Err(DomainError::Infrastructure(_))
        ));
    }
}
