// src/services/guard.rs

//! Course ownership checks. Every operation on a test, its questions or
//! its marks goes through one of these before touching anything else.

use crate::{
    error::AppError,
    models::{assessment::Test, course::Course},
    store::AssessmentStore,
    utils::jwt::Principal,
};

/// Requires `principal` to be the faculty member who owns `course_id`.
pub async fn authorize_course(
    store: &dyn AssessmentStore,
    principal: &Principal,
    course_id: i64,
) -> Result<Course, AppError> {
    let course = store
        .find_course(course_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    if course.faculty_id != principal.employee_id {
        tracing::warn!(
            employee_id = principal.employee_id,
            course_id,
            "Rejected access to a course owned by another faculty member"
        );
        return Err(AppError::Forbidden(
            "You can only manage assessments of your own courses".to_string(),
        ));
    }

    Ok(course)
}

/// Resolves the course behind `test_id` and requires `principal` to own it.
pub async fn authorize_test(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
) -> Result<Test, AppError> {
    let test = store
        .find_test(test_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Test not found".to_string()))?;

    authorize_course(store, principal, test.course_id).await?;
    Ok(test)
}
