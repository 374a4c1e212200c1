//! In-memory store and classifier doubles shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

use crate::error::StoreError;
use crate::moderation::{ImageAnalysis, ImageClassifier, ImageInput};
use crate::store::{ContentStore, Filter, RemoteStore, SelectQuery};

/// One observed call against the fake backend
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Select { table: String },
    Insert { table: String, record: Value },
    Delete { table: String, filters: Vec<Filter> },
    Upload { bucket: String, path: String },
}

/// Remote store and content store in one, recording every call in order
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Mutex<Vec<Call>>,
    pub rows: Mutex<HashMap<String, Vec<Value>>>,
    pub fail_inserts_into: HashSet<String>,
    pub fail_deletes: bool,
    pub fail_upload_paths: HashSet<String>,
    next_id: Mutex<u32>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, table: &str, rows: Vec<Value>) -> Self {
        self.rows.lock().unwrap().insert(table.to_string(), rows);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn network_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_id(&self, table: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("{}-{}", table, next)
    }
}

fn api_error(message: &str) -> StoreError {
    StoreError::Api {
        status: 400,
        code: Some("23502".into()),
        message: message.to_string(),
    }
}

#[async_trait]
impl RemoteStore for RecordingBackend {
    async fn select(&self, table: &str, _query: &SelectQuery) -> Result<Vec<Value>, StoreError> {
        self.record(Call::Select {
            table: table.to_string(),
        });
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, record: Value) -> Result<Value, StoreError> {
        self.record(Call::Insert {
            table: table.to_string(),
            record: record.clone(),
        });
        if self.fail_inserts_into.contains(table) {
            return Err(api_error("insert rejected"));
        }

        let mut row = record;
        if let Value::Object(map) = &mut row {
            map.entry("id").or_insert_with(|| json!(self.next_id(table)));
            map.entry("created_at")
                .or_insert_with(|| json!("2025-03-01T12:00:00Z"));
        }
        self.rows
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<(), StoreError> {
        self.record(Call::Delete {
            table: table.to_string(),
            filters: filters.to_vec(),
        });
        if self.fail_deletes {
            return Err(StoreError::Transport("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for RecordingBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        _bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        self.record(Call::Upload {
            bucket: bucket.to_string(),
            path: path.to_string(),
        });
        if self.fail_upload_paths.contains(path) {
            return Err(StoreError::Transport("upload dropped".into()));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://cdn.test/{}/{}", bucket, path)
    }
}

/// Classifier answering from a table keyed by image payload, with optional per-image delay
#[derive(Default)]
pub struct ScriptedClassifier {
    pub verdicts: HashMap<Vec<u8>, (ImageAnalysis, Duration)>,
    pub calls: Mutex<usize>,
}

impl ScriptedClassifier {
    pub fn verdict(mut self, payload: &[u8], analysis: ImageAnalysis, delay_ms: u64) -> Self {
        self.verdicts
            .insert(payload.to_vec(), (analysis, Duration::from_millis(delay_ms)));
        self
    }

    pub fn approve(payload: &[u8], category: Option<&str>) -> ImageAnalysis {
        ImageAnalysis {
            is_approved: true,
            detected_items: vec![String::from_utf8_lossy(payload).into_owned()],
            category: category.map(str::to_string),
            confidence: 0.9,
            reason: "Modest garment".to_string(),
            is_modest: true,
        }
    }
}

#[async_trait]
impl ImageClassifier for ScriptedClassifier {
    async fn classify(&self, image: &ImageInput) -> ImageAnalysis {
        *self.calls.lock().unwrap() += 1;
        match self.verdicts.get(image.bytes.as_ref()) {
            Some((analysis, delay)) => {
                tokio::time::sleep(*delay).await;
                analysis.clone()
            }
            None => ImageAnalysis::rejected("Analysis error: unknown image"),
        }
    }
}
