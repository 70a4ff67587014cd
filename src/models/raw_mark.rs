// src/models/raw_mark.rs

use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};
use serde_json::Value;
use sqlx::FromRow;

use crate::models::{marks::Marks, question::question_identifier};

/// Represents the 'raw_marks' table: one student's score on one question.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct RawMark {
    pub id: i64,
    pub test_id: i64,
    pub student_id: i64,
    pub question_id: i64,
    pub marks: f64,
}

/// A raw mark joined with the metadata of its question.
#[derive(Debug, Clone, FromRow, Deserialize, PartialEq)]
pub struct RawMarkDetail {
    pub id: i64,
    pub test_id: i64,
    pub student_id: i64,
    pub question_id: i64,
    pub marks: f64,
    pub question_number: i32,
    pub sub_question: Option<String>,
    pub co: i32,
    pub max_marks: f64,
}

impl RawMarkDetail {
    pub fn identifier(&self) -> String {
        question_identifier(self.question_number, self.sub_question.as_deref())
    }
}

impl Serialize for RawMarkDetail {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("RawMarkDetail", 10)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("test_id", &self.test_id)?;
        s.serialize_field("student_id", &self.student_id)?;
        s.serialize_field("question_id", &self.question_id)?;
        s.serialize_field("marks", &self.marks)?;
        s.serialize_field("question_number", &self.question_number)?;
        s.serialize_field("sub_question", &self.sub_question)?;
        s.serialize_field("question_identifier", &self.identifier())?;
        s.serialize_field("co", &self.co)?;
        s.serialize_field("max_marks", &self.max_marks)?;
        s.end()
    }
}

/// DTO for saving a single raw mark.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaveRawMarkRequest {
    pub student_id: i64,
    pub question_id: i64,
    #[serde(alias = "marks_obtained")]
    pub marks: Value,
}

/// One element of a per-student marks-by-question submission.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuestionMarkInput {
    pub question_id: Option<i64>,
    #[serde(alias = "marks_obtained")]
    pub marks: Option<Value>,
}

/// DTO for saving every question mark of one student in one go.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SaveMarksByQuestionRequest {
    pub marks: Vec<QuestionMarkInput>,
}

/// Raw marks written by an ingestion call together with the refreshed aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawMarksSaved {
    pub raw_marks: Vec<RawMark>,
    pub marks: Marks,
}

/// Outcome of removing raw marks for a student.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawMarksDeleted {
    pub deleted: u64,
    pub marks: Marks,
}
