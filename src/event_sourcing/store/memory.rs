use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::event_log::{validate_append, EventLog, EventLogError, StoredEvent, StreamAppend};

/// Process-local event log. One write lock covers a whole batch, so the
/// version check and the append are a single critical section.
#[derive(Default)]
pub struct InMemoryEventLog {
    streams: RwLock<HashMap<Uuid, Vec<StoredEvent>>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append_batch(&self, appends: Vec<StreamAppend>) -> Result<Vec<i64>, EventLogError> {
        let mut seen = HashSet::new();
        for append in &appends {
            if !seen.insert(append.stream_id) {
                return Err(EventLogError::DuplicateStream(append.stream_id));
            }
            validate_append(append)?;
        }

        let mut streams = self.streams.write().await;

        for append in &appends {
            let actual = streams.get(&append.stream_id).map_or(0, |s| s.len() as i64);
            if actual != append.expected_version {
                tracing::warn!(
                    stream_id = %append.stream_id,
                    expected = append.expected_version,
                    actual = actual,
                    "Rejected append on version mismatch"
                );
                return Err(EventLogError::ConcurrencyConflict {
                    stream_id: append.stream_id,
                    expected: append.expected_version,
                    actual,
                });
            }
        }

        let mut versions = Vec::with_capacity(appends.len());
        for append in appends {
            let stream = streams.entry(append.stream_id).or_default();
            stream.extend(append.events);
            versions.push(stream.len() as i64);
        }

        Ok(versions)
    }

    async fn read_stream(&self, stream_id: Uuid) -> Result<Vec<StoredEvent>, EventLogError> {
        Ok(self.streams.read().await.get(&stream_id).cloned().unwrap_or_default())
    }

    async fn current_version(&self, stream_id: Uuid) -> Result<i64, EventLogError> {
        Ok(self.streams.read().await.get(&stream_id).map_or(0, |s| s.len() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn record(stream_id: Uuid, position: i64) -> StoredEvent {
        StoredEvent {
            stream_id,
            position,
            event_id: Uuid::new_v4(),
            event_type: "Test".to_string(),
            event_version: 1,
            payload: "{}".to_string(),
            causation_id: None,
            correlation_id: Uuid::new_v4(),
            actor: None,
            timestamp: Utc::now(),
            signature: None,
        }
    }

    fn append(stream_id: Uuid, expected_version: i64, count: i64) -> StreamAppend {
        StreamAppend {
            stream_id,
            expected_version,
            events: (1..=count).map(|i| record(stream_id, expected_version + i)).collect(),
        }
    }

    #[tokio::test]
    async fn test_append_and_read_in_order() {
        let log = InMemoryEventLog::new();
        let id = Uuid::new_v4();

        assert_eq!(log.append(append(id, 0, 2)).await.unwrap(), 2);
        assert_eq!(log.append(append(id, 2, 1)).await.unwrap(), 3);

        let events = log.read_stream(id).await.unwrap();
        let positions: Vec<i64> = events.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(log.current_version(id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_stale_expected_version_conflicts() {
        let log = InMemoryEventLog::new();
        let id = Uuid::new_v4();
        log.append(append(id, 0, 1)).await.unwrap();

        let err = log.append(append(id, 0, 1)).await.unwrap_err();
        assert!(matches!(
            err,
            EventLogError::ConcurrencyConflict { expected: 0, actual: 1, .. }
        ));
        assert_eq!(log.current_version(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let log = InMemoryEventLog::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        log.append(append(b, 0, 1)).await.unwrap();

        // b is at version 1, so the whole batch must be rejected
        let result = log.append_batch(vec![append(a, 0, 1), append(b, 0, 1)]).await;
        assert!(result.unwrap_err().is_conflict());
        assert_eq!(log.current_version(a).await.unwrap(), 0);
        assert_eq!(log.current_version(b).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_position_gap_rejected() {
        let log = InMemoryEventLog::new();
        let id = Uuid::new_v4();
        let bad = StreamAppend {
            stream_id: id,
            expected_version: 0,
            events: vec![record(id, 2)],
        };
        assert!(matches!(
            log.append(bad).await,
            Err(EventLogError::PositionGap { expected: 1, got: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_saves_exactly_one_wins() {
        let log = Arc::new(InMemoryEventLog::new());
        let id = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let log = log.clone();
            handles.push(tokio::spawn(async move { log.append(append(id, 0, 1)).await }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(conflicts, 9);
        assert_eq!(log.current_version(id).await.unwrap(), 1);
    }
}
