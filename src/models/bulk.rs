// src/models/bulk.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// DTO for a multi-student marks upload.
///
/// Entries stay untyped: a malformed entry must become a failed row in the
/// result, not a rejection of the whole upload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BulkSaveMarksRequest {
    pub entries: Vec<Value>,
}

/// A row that was saved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkSuccess {
    pub index: usize,
    pub student_id: i64,
    pub student_rollno: String,
    pub question_id: i64,
    pub question_identifier: String,
    pub marks_obtained: f64,
}

/// A row that was rejected, echoed back with the reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkFailure {
    pub index: usize,
    pub entry: Value,
    pub reason: String,
}

/// A student whose marks were saved but whose CO totals could not be refreshed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregationFailure {
    pub student_id: i64,
    pub reason: String,
}

/// Per-row report of a bulk upload. Saved rows stay saved even when other
/// rows fail.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BulkSaveResult {
    pub successful: Vec<BulkSuccess>,
    pub failed: Vec<BulkFailure>,
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregation_failures: Vec<AggregationFailure>,
}

impl BulkSaveResult {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn succeed(&mut self, success: BulkSuccess) {
        self.successful.push(success);
        self.success_count = self.successful.len();
    }

    pub fn fail(&mut self, index: usize, entry: &Value, reason: impl Into<String>) {
        self.failed.push(BulkFailure {
            index,
            entry: entry.clone(),
            reason: reason.into(),
        });
        self.failure_count = self.failed.len();
    }
}
