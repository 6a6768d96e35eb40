//! Turns storage notifications into metadata upserts.
//!
//! The indexer never retries. A failed write aborts the rest of the batch and
//! is reported with a [`FailureClass`] so the delivery subsystem can choose
//! between redelivery and dead-lettering. Every write is a full-record
//! overwrite keyed by `file_name`, which makes redelivery safe.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ServiceError, ServiceErrorKind};
use crate::event::{decode_object_key, S3Event, S3EventRecord};

/// Row stored per object, keyed by `file_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub file_name: String,
    pub bucket_name: String,
    pub file_size_bytes: u64,
    pub upload_timestamp: String,
    pub processed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Redelivering the same batch may succeed.
    Retryable,
    /// Redelivery cannot help; the batch should be dead-lettered.
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub class: FailureClass,
    pub message: String,
}

impl From<ServiceError> for StoreError {
    fn from(error: ServiceError) -> Self {
        let class = match error.kind {
            ServiceErrorKind::TransientUnavailable => FailureClass::Retryable,
            _ => FailureClass::Terminal,
        };
        Self {
            class,
            message: error.to_string(),
        }
    }
}

/// Upsert-only view of the metadata table. Implementations are shared by
/// concurrent invocations and must not rely on interior mutable state.
pub trait MetadataStore: Send + Sync {
    /// Replaces any existing record with the same `file_name` in full.
    fn put_record(&self, record: &MetadataRecord) -> Result<(), StoreError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub records_indexed: usize,
    pub file_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} failure after {committed} committed record(s){}: {message}", class_label(.class), record_label(.record_index, .file_name))]
pub struct IndexFailure {
    pub class: FailureClass,
    pub message: String,
    /// Position of the failing record in the batch, when one was reached.
    pub record_index: Option<usize>,
    pub file_name: Option<String>,
    /// Records written before the failure; they stay committed.
    pub committed: usize,
}

impl IndexFailure {
    pub fn is_retryable(&self) -> bool {
        self.class == FailureClass::Retryable
    }
}

fn class_label(class: &FailureClass) -> &'static str {
    match class {
        FailureClass::Retryable => "retryable",
        FailureClass::Terminal => "terminal",
    }
}

fn record_label(record_index: &Option<usize>, file_name: &Option<String>) -> String {
    match (record_index, file_name) {
        (Some(index), Some(name)) => format!(" at record {index} ({name})"),
        (Some(index), None) => format!(" at record {index}"),
        _ => String::new(),
    }
}

pub struct MetadataIndexer<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: MetadataStore> MetadataIndexer<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: MetadataStore, C: Clock> MetadataIndexer<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn build_record(&self, record: &S3EventRecord) -> MetadataRecord {
        MetadataRecord {
            file_name: decode_object_key(&record.s3.object.key),
            bucket_name: record.s3.bucket.name.clone(),
            file_size_bytes: record.s3.object.size,
            upload_timestamp: record.event_time.clone(),
            processed_at: self
                .clock
                .now()
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }

    /// Parses a raw invocation payload and indexes it. A payload that is not
    /// a storage notification is terminal: no redelivery will fix it.
    pub fn index_payload(&self, payload: serde_json::Value) -> Result<BatchOutcome, IndexFailure> {
        let event: S3Event = serde_json::from_value(payload).map_err(|error| IndexFailure {
            class: FailureClass::Terminal,
            message: format!("invalid storage notification: {error}"),
            record_index: None,
            file_name: None,
            committed: 0,
        })?;
        self.index_batch(&event)
    }

    /// Upserts one record per notification, in order, stopping at the first
    /// failed write.
    pub fn index_batch(&self, event: &S3Event) -> Result<BatchOutcome, IndexFailure> {
        let mut file_names = Vec::with_capacity(event.records.len());

        for (index, notification) in event.records.iter().enumerate() {
            let record = self.build_record(notification);
            tracing::info!(
                bucket = %record.bucket_name,
                file_name = %record.file_name,
                size = record.file_size_bytes,
                "indexing object"
            );

            if let Err(error) = self.store.put_record(&record) {
                tracing::error!(
                    file_name = %record.file_name,
                    record_index = index,
                    class = ?error.class,
                    error = %error,
                    "metadata write failed, aborting batch"
                );
                return Err(IndexFailure {
                    class: error.class,
                    message: error.message,
                    record_index: Some(index),
                    file_name: Some(record.file_name),
                    committed: file_names.len(),
                });
            }
            file_names.push(record.file_name);
        }

        Ok(BatchOutcome {
            records_indexed: file_names.len(),
            file_names,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    struct RecordingStore {
        rows: Mutex<HashMap<String, MetadataRecord>>,
        writes: Mutex<usize>,
        fail_on_write: Option<(usize, FailureClass)>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                rows: Mutex::new(HashMap::new()),
                writes: Mutex::new(0),
                fail_on_write: None,
            }
        }

        fn failing_on(write_number: usize, class: FailureClass) -> Self {
            Self {
                fail_on_write: Some((write_number, class)),
                ..Self::new()
            }
        }

        fn rows(&self) -> HashMap<String, MetadataRecord> {
            self.rows.lock().expect("poisoned mutex").clone()
        }
    }

    impl MetadataStore for RecordingStore {
        fn put_record(&self, record: &MetadataRecord) -> Result<(), StoreError> {
            let mut writes = self.writes.lock().expect("poisoned mutex");
            *writes += 1;
            if let Some((write_number, class)) = self.fail_on_write {
                if *writes == write_number {
                    return Err(StoreError {
                        class,
                        message: "simulated write failure".to_string(),
                    });
                }
            }
            self.rows
                .lock()
                .expect("poisoned mutex")
                .insert(record.file_name.clone(), record.clone());
            Ok(())
        }
    }

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
                .single()
                .expect("valid timestamp")
        }
    }

    fn notification(bucket: &str, key: &str, size: u64, event_time: &str) -> serde_json::Value {
        json!({
            "eventSource": "aws:s3",
            "eventTime": event_time,
            "s3": {
                "bucket": { "name": bucket },
                "object": { "key": key, "size": size }
            }
        })
    }

    fn event(records: Vec<serde_json::Value>) -> serde_json::Value {
        json!({ "Records": records })
    }

    #[test]
    fn indexes_single_record_with_decoded_key() {
        let indexer = MetadataIndexer::with_clock(RecordingStore::new(), FixedClock);
        let outcome = indexer
            .index_payload(event(vec![notification(
                "b1",
                "a%2Bb.txt",
                42,
                "2024-01-01T00:00:00Z",
            )]))
            .expect("batch should succeed");

        assert_eq!(outcome.records_indexed, 1);
        let rows = indexer.store().rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows["a+b.txt"],
            MetadataRecord {
                file_name: "a+b.txt".to_string(),
                bucket_name: "b1".to_string(),
                file_size_bytes: 42,
                upload_timestamp: "2024-01-01T00:00:00Z".to_string(),
                processed_at: "2024-05-06T07:08:09.000000Z".to_string(),
            }
        );
    }

    #[test]
    fn later_write_replaces_earlier_record() {
        let indexer = MetadataIndexer::with_clock(RecordingStore::new(), FixedClock);
        indexer
            .index_payload(event(vec![notification("b1", "x", 10, "t1")]))
            .expect("first batch should succeed");
        indexer
            .index_payload(event(vec![notification("b1", "x", 99, "t2")]))
            .expect("second batch should succeed");

        let rows = indexer.store().rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows["x"].file_size_bytes, 99);
        assert_eq!(rows["x"].upload_timestamp, "t2");
    }

    #[test]
    fn failed_write_keeps_earlier_records_and_fails_batch() {
        let indexer = MetadataIndexer::with_clock(
            RecordingStore::failing_on(2, FailureClass::Retryable),
            FixedClock,
        );
        let failure = indexer
            .index_payload(event(vec![
                notification("b1", "first.txt", 1, "t1"),
                notification("b1", "second.txt", 2, "t1"),
                notification("b1", "third.txt", 3, "t1"),
            ]))
            .expect_err("batch should fail on second write");

        assert!(failure.is_retryable());
        assert_eq!(failure.record_index, Some(1));
        assert_eq!(failure.file_name.as_deref(), Some("second.txt"));
        assert_eq!(failure.committed, 1);

        let rows = indexer.store().rows();
        assert_eq!(rows.len(), 1);
        assert!(rows.contains_key("first.txt"));
        assert!(!rows.contains_key("third.txt"));
    }

    #[test]
    fn malformed_payload_is_terminal_without_writes() {
        let indexer = MetadataIndexer::with_clock(RecordingStore::new(), FixedClock);
        let failure = indexer
            .index_payload(json!({ "Records": [{ "s3": {} }] }))
            .expect_err("payload should be rejected");

        assert_eq!(failure.class, FailureClass::Terminal);
        assert_eq!(failure.record_index, None);
        assert!(indexer.store().rows().is_empty());
    }

    #[test]
    fn store_errors_classify_by_service_kind() {
        let throttled = ServiceError::new(
            ServiceErrorKind::TransientUnavailable,
            "ProvisionedThroughputExceededException",
            "slow down",
        );
        assert_eq!(StoreError::from(throttled).class, FailureClass::Retryable);

        let denied = ServiceError::new(ServiceErrorKind::PermissionDenied, "AccessDeniedException", "no");
        assert_eq!(StoreError::from(denied).class, FailureClass::Terminal);
    }

    #[test]
    fn failure_message_names_record_and_class() {
        let failure = IndexFailure {
            class: FailureClass::Terminal,
            message: "AccessDeniedException: no".to_string(),
            record_index: Some(0),
            file_name: Some("x".to_string()),
            committed: 0,
        };
        assert_eq!(
            failure.to_string(),
            "terminal failure after 0 committed record(s) at record 0 (x): AccessDeniedException: no"
        );
    }
}
