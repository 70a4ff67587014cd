// src/handlers/marks.rs

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        bulk::BulkSaveMarksRequest,
        marks::SaveMarksByCoRequest,
        raw_mark::{SaveMarksByQuestionRequest, SaveRawMarkRequest},
    },
    services::{aggregation, bulk, marks},
    store::SharedStore,
    utils::jwt::Principal,
};

/// Saves one question mark and returns it with the refreshed CO totals.
pub async fn save_raw_mark(
    State(store): State<SharedStore>,
    principal: Principal,
    Path(test_id): Path<i64>,
    payload: Result<Json<SaveRawMarkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let saved = marks::save_raw_mark(store.as_ref(), &principal, test_id, payload).await?;
    Ok(Json(saved))
}

/// Saves a student's whole answer sheet. All entries or none.
pub async fn save_marks_by_question(
    State(store): State<SharedStore>,
    principal: Principal,
    Path((test_id, student_id)): Path<(i64, i64)>,
    payload: Result<Json<SaveMarksByQuestionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let saved =
        marks::save_marks_by_question(store.as_ref(), &principal, test_id, student_id, payload.marks)
            .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// Multi-student upload. Always 200 once the upload itself is accepted;
/// per-row outcomes are in the body.
pub async fn bulk_save_marks(
    State(store): State<SharedStore>,
    principal: Principal,
    Path(test_id): Path<i64>,
    payload: Result<Json<BulkSaveMarksRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let result = bulk::bulk_save_marks(store.as_ref(), &principal, test_id, payload.entries).await?;
    Ok(Json(result))
}

pub async fn list_raw_marks(
    State(store): State<SharedStore>,
    principal: Principal,
    Path((test_id, student_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let rows = marks::list_raw_marks(store.as_ref(), &principal, test_id, student_id).await?;
    Ok(Json(rows))
}

pub async fn delete_raw_mark(
    State(store): State<SharedStore>,
    principal: Principal,
    Path((test_id, raw_mark_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let refreshed = marks::delete_raw_mark(store.as_ref(), &principal, test_id, raw_mark_id).await?;
    Ok(Json(refreshed))
}

pub async fn clear_raw_marks(
    State(store): State<SharedStore>,
    principal: Principal,
    Path((test_id, student_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let cleared = marks::clear_raw_marks(store.as_ref(), &principal, test_id, student_id).await?;
    Ok(Json(cleared))
}

pub async fn list_test_marks(
    State(store): State<SharedStore>,
    principal: Principal,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let rows = aggregation::list_test_marks(store.as_ref(), &principal, test_id).await?;
    Ok(Json(rows))
}

pub async fn get_student_marks(
    State(store): State<SharedStore>,
    principal: Principal,
    Path((test_id, student_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let row = aggregation::get_student_marks(store.as_ref(), &principal, test_id, student_id).await?;
    Ok(Json(row))
}

/// Stores hand-entered CO totals, bypassing raw marks.
pub async fn save_marks_by_co(
    State(store): State<SharedStore>,
    principal: Principal,
    Path((test_id, student_id)): Path<(i64, i64)>,
    payload: Result<Json<SaveMarksByCoRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let row =
        aggregation::save_marks_by_co(store.as_ref(), &principal, test_id, student_id, payload)
            .await?;
    Ok(Json(row))
}

pub async fn refresh_student_marks(
    State(store): State<SharedStore>,
    principal: Principal,
    Path((test_id, student_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let row =
        aggregation::refresh_student_marks(store.as_ref(), &principal, test_id, student_id).await?;
    Ok(Json(row))
}

pub async fn delete_student_marks(
    State(store): State<SharedStore>,
    principal: Principal,
    Path((test_id, student_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    marks::delete_student_marks(store.as_ref(), &principal, test_id, student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
