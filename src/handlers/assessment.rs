// src/handlers/assessment.rs

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::assessment::CreateTestRequest,
    services::assessment,
    store::SharedStore,
    utils::jwt::Principal,
};

/// Creates a test together with its question paper.
/// Returns 201 Created with the test and its ordered questions.
pub async fn create_test(
    State(store): State<SharedStore>,
    principal: Principal,
    payload: Result<Json<CreateTestRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let created = assessment::create_assessment(store.as_ref(), &principal, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Lists the tests of a course owned by the caller.
pub async fn list_course_tests(
    State(store): State<SharedStore>,
    principal: Principal,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let tests = assessment::list_course_tests(store.as_ref(), &principal, course_id).await?;
    Ok(Json(tests))
}

pub async fn get_test(
    State(store): State<SharedStore>,
    principal: Principal,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let test = assessment::get_assessment(store.as_ref(), &principal, test_id).await?;
    Ok(Json(test))
}

pub async fn list_questions(
    State(store): State<SharedStore>,
    principal: Principal,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let questions = assessment::list_questions(store.as_ref(), &principal, test_id).await?;
    Ok(Json(questions))
}

/// Deletes a test and everything recorded against it.
pub async fn delete_test(
    State(store): State<SharedStore>,
    principal: Principal,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    assessment::delete_assessment(store.as_ref(), &principal, test_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
