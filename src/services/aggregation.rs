// src/services/aggregation.rs

//! CO-aggregate maintenance.
//!
//! The `marks` row of a student has two writers: `aggregate_from_raw_marks`
//! derives it from raw question marks, and `save_marks_by_co` overwrites it
//! with hand-entered totals. Neither records provenance, so whichever runs
//! last determines the stored totals.

use crate::{
    error::AppError,
    models::marks::{CoTotals, Marks, SaveMarksByCoRequest},
    services::guard::authorize_test,
    store::AssessmentStore,
    utils::jwt::Principal,
};

/// Recomputes a student's CO totals from their raw marks and stores them.
///
/// Running it again with unchanged raw marks stores the same totals. A
/// student with no raw marks ends up with an all-zero row.
pub async fn aggregate_from_raw_marks(
    store: &dyn AssessmentStore,
    test_id: i64,
    student_id: i64,
) -> Result<Marks, AppError> {
    if store.find_test(test_id).await?.is_none() {
        return Err(AppError::NotFound("Test not found".to_string()));
    }
    if store.find_student(student_id).await?.is_none() {
        return Err(AppError::NotFound("Student not found".to_string()));
    }

    let rows = store.list_raw_marks(test_id, student_id).await?;
    let totals = CoTotals::from_raw_marks(&rows)?;

    tracing::debug!(test_id, student_id, rows = rows.len(), "Aggregated CO totals");
    store.upsert_marks(test_id, student_id, totals).await
}

/// Re-derives a student's totals on request of the owning faculty member.
pub async fn refresh_student_marks(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
    student_id: i64,
) -> Result<Marks, AppError> {
    authorize_test(store, principal, test_id).await?;
    aggregate_from_raw_marks(store, test_id, student_id).await
}

/// Stores hand-entered CO totals. Raw marks are neither read nor written.
/// All six outcomes are required; an incomplete request leaves the stored row alone.
pub async fn save_marks_by_co(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
    student_id: i64,
    req: SaveMarksByCoRequest,
) -> Result<Marks, AppError> {
    authorize_test(store, principal, test_id).await?;

    if store.find_student(student_id).await?.is_none() {
        return Err(AppError::NotFound("Student not found".to_string()));
    }

    let totals = req.into_totals()?;

    let marks = store.upsert_marks(test_id, student_id, totals).await?;
    tracing::info!(test_id, student_id, "CO marks entered manually");
    Ok(marks)
}

pub async fn get_student_marks(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
    student_id: i64,
) -> Result<Marks, AppError> {
    authorize_test(store, principal, test_id).await?;

    store
        .find_marks(test_id, student_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Marks entry not found".to_string()))
}

pub async fn list_test_marks(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
) -> Result<Vec<Marks>, AppError> {
    authorize_test(store, principal, test_id).await?;
    store.list_marks(test_id).await
}
