// src/store/mod.rs

//! Persistence boundary for the assessment subsystem.
//!
//! Each method is one atomic step. Methods that write several rows
//! (`insert_questions`, `upsert_raw_marks`, `delete_student_marks`) run
//! inside a single transaction and either write everything or nothing.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        assessment::{NewTest, Test},
        course::{Course, Student},
        marks::{CoTotals, Marks},
        question::{NewQuestion, Question},
        raw_mark::{RawMark, RawMarkDetail},
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type SharedStore = Arc<dyn AssessmentStore>;

#[async_trait]
pub trait AssessmentStore: Send + Sync {
    // Courses and students are owned by other services; read-only here.
    async fn find_course(&self, course_id: i64) -> Result<Option<Course>, AppError>;
    async fn find_student(&self, student_id: i64) -> Result<Option<Student>, AppError>;
    async fn find_student_by_rollno(&self, rollno: &str) -> Result<Option<Student>, AppError>;

    async fn insert_test(&self, test: &NewTest) -> Result<Test, AppError>;
    async fn find_test(&self, test_id: i64) -> Result<Option<Test>, AppError>;
    async fn list_tests_for_course(&self, course_id: i64) -> Result<Vec<Test>, AppError>;
    /// Removes a test and, through cascades, its questions and marks.
    async fn delete_test(&self, test_id: i64) -> Result<bool, AppError>;

    /// Batch insert in one transaction. Returns the rows ordered by
    /// question number, then sub-question.
    async fn insert_questions(&self, questions: &[NewQuestion]) -> Result<Vec<Question>, AppError>;
    async fn list_questions(&self, test_id: i64) -> Result<Vec<Question>, AppError>;
    async fn find_question(&self, question_id: i64) -> Result<Option<Question>, AppError>;

    /// Insert-or-replace keyed by (test, student, question).
    async fn upsert_raw_mark(
        &self,
        test_id: i64,
        student_id: i64,
        question_id: i64,
        marks: f64,
    ) -> Result<RawMark, AppError>;
    /// Upserts every (question_id, marks) pair for one student in one transaction.
    async fn upsert_raw_marks(
        &self,
        test_id: i64,
        student_id: i64,
        marks: &[(i64, f64)],
    ) -> Result<Vec<RawMark>, AppError>;
    async fn find_raw_mark(&self, raw_mark_id: i64) -> Result<Option<RawMark>, AppError>;
    /// Rows joined with question metadata, ordered by question number then sub-question.
    async fn list_raw_marks(
        &self,
        test_id: i64,
        student_id: i64,
    ) -> Result<Vec<RawMarkDetail>, AppError>;
    async fn delete_raw_mark(&self, raw_mark_id: i64) -> Result<bool, AppError>;
    async fn delete_raw_marks(&self, test_id: i64, student_id: i64) -> Result<u64, AppError>;

    /// Insert-or-replace keyed by (test, student).
    async fn upsert_marks(
        &self,
        test_id: i64,
        student_id: i64,
        totals: CoTotals,
    ) -> Result<Marks, AppError>;
    async fn find_marks(&self, test_id: i64, student_id: i64) -> Result<Option<Marks>, AppError>;
    async fn list_marks(&self, test_id: i64) -> Result<Vec<Marks>, AppError>;
    /// Removes a student's raw marks and CO row for a test in one transaction.
    /// Returns the number of raw marks removed and whether a CO row existed.
    async fn delete_student_marks(
        &self,
        test_id: i64,
        student_id: i64,
    ) -> Result<(u64, bool), AppError>;
}
