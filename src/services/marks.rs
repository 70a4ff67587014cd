// src/services/marks.rs

//! Question-level mark ingestion for a single student.
//!
//! `save_raw_mark` writes one row; `save_marks_by_question` writes a whole
//! answer sheet and is atomic: the sheet is validated up front and written
//! in one transaction, so one bad entry leaves nothing behind. Every path
//! re-derives the student's CO totals afterwards.

use std::collections::HashMap;

use serde_json::Value;

use crate::{
    error::AppError,
    models::{
        marks::Marks,
        question::Question,
        raw_mark::{
            QuestionMarkInput, RawMarkDetail, RawMarksDeleted, RawMarksSaved, SaveRawMarkRequest,
        },
    },
    services::{aggregation::aggregate_from_raw_marks, guard::authorize_test},
    store::AssessmentStore,
    utils::{coerce, jwt::Principal},
};

/// Checks a submitted mark against its question: numeric, non-negative and
/// not above the question's maximum. Returns the reason on failure.
pub(crate) fn validate_marks(value: &Value, question: &Question) -> Result<f64, String> {
    let marks = coerce::as_number(value).ok_or_else(|| format!("marks must be a number (got {})", value))?;

    if marks < 0.0 {
        return Err(format!("marks cannot be negative (got {})", marks));
    }
    if marks > question.max_marks {
        return Err(format!(
            "marks {} exceed the maximum of {} for question {}",
            marks,
            question.max_marks,
            question.identifier()
        ));
    }

    Ok(marks)
}

async fn require_student(store: &dyn AssessmentStore, student_id: i64) -> Result<(), AppError> {
    match store.find_student(student_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound("Student not found".to_string())),
    }
}

/// Saves one question mark for one student and refreshes their CO totals.
pub async fn save_raw_mark(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
    req: SaveRawMarkRequest,
) -> Result<RawMarksSaved, AppError> {
    authorize_test(store, principal, test_id).await?;
    require_student(store, req.student_id).await?;

    let question = store
        .find_question(req.question_id)
        .await?
        .filter(|q| q.test_id == test_id)
        .ok_or_else(|| AppError::NotFound("Question not found in this test".to_string()))?;

    let marks = validate_marks(&req.marks, &question).map_err(AppError::BadRequest)?;

    let row = store
        .upsert_raw_mark(test_id, req.student_id, question.id, marks)
        .await?;
    let aggregate = aggregate_from_raw_marks(store, test_id, req.student_id).await?;

    Ok(RawMarksSaved {
        raw_marks: vec![row],
        marks: aggregate,
    })
}

/// Saves a student's whole answer sheet atomically.
pub async fn save_marks_by_question(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
    student_id: i64,
    entries: Vec<QuestionMarkInput>,
) -> Result<RawMarksSaved, AppError> {
    authorize_test(store, principal, test_id).await?;
    require_student(store, student_id).await?;

    if entries.is_empty() {
        return Err(AppError::BadRequest("marks must be a non-empty array".to_string()));
    }

    let questions: HashMap<i64, Question> = store
        .list_questions(test_id)
        .await?
        .into_iter()
        .map(|q| (q.id, q))
        .collect();

    let mut validated = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let (Some(question_id), Some(value)) = (entry.question_id, entry.marks.as_ref()) else {
            return Err(AppError::BadRequest(format!(
                "Entry {}: question_id and marks are required",
                i + 1
            )));
        };

        let question = questions.get(&question_id).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Entry {}: question {} does not belong to this test",
                i + 1,
                question_id
            ))
        })?;

        let marks = validate_marks(value, question)
            .map_err(|reason| AppError::BadRequest(format!("Entry {}: {}", i + 1, reason)))?;

        validated.push((question_id, marks));
    }

    let rows = store.upsert_raw_marks(test_id, student_id, &validated).await?;
    let aggregate = aggregate_from_raw_marks(store, test_id, student_id).await?;

    tracing::info!(test_id, student_id, rows = rows.len(), "Saved marks by question");

    Ok(RawMarksSaved {
        raw_marks: rows,
        marks: aggregate,
    })
}

/// Lists a student's raw marks ordered by question number then sub-question.
pub async fn list_raw_marks(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
    student_id: i64,
) -> Result<Vec<RawMarkDetail>, AppError> {
    authorize_test(store, principal, test_id).await?;
    store.list_raw_marks(test_id, student_id).await
}

/// Deletes one raw mark and re-derives the owner's CO totals.
pub async fn delete_raw_mark(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
    raw_mark_id: i64,
) -> Result<Marks, AppError> {
    authorize_test(store, principal, test_id).await?;

    let row = store
        .find_raw_mark(raw_mark_id)
        .await?
        .filter(|r| r.test_id == test_id)
        .ok_or_else(|| AppError::NotFound("Raw mark not found".to_string()))?;

    if !store.delete_raw_mark(row.id).await? {
        return Err(AppError::NotFound("Raw mark not found".to_string()));
    }

    aggregate_from_raw_marks(store, test_id, row.student_id).await
}

/// Deletes all of a student's raw marks for a test. The CO row is kept and
/// re-derived, which leaves it at zero.
pub async fn clear_raw_marks(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
    student_id: i64,
) -> Result<RawMarksDeleted, AppError> {
    authorize_test(store, principal, test_id).await?;
    require_student(store, student_id).await?;

    let deleted = store.delete_raw_marks(test_id, student_id).await?;
    let marks = aggregate_from_raw_marks(store, test_id, student_id).await?;

    tracing::info!(test_id, student_id, deleted, "Cleared raw marks");
    Ok(RawMarksDeleted { deleted, marks })
}

/// Removes everything recorded for a student on a test: raw marks and the CO row.
pub async fn delete_student_marks(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
    student_id: i64,
) -> Result<(), AppError> {
    authorize_test(store, principal, test_id).await?;

    let (deleted_raw, deleted_marks) = store.delete_student_marks(test_id, student_id).await?;

    if deleted_raw == 0 && !deleted_marks {
        return Err(AppError::NotFound("Marks entry not found".to_string()));
    }

    tracing::info!(test_id, student_id, deleted_raw, "Deleted student marks");
    Ok(())
}
