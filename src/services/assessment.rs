// src/services/assessment.rs

//! Creation and retrieval of tests with their question papers.
//!
//! A test and its questions are created with a two-phase create-or-abort
//! protocol:
//!
//! 1. Insert the test row. Questions reference it, so its id is needed first.
//! 2. Validate every question against that id. The first invalid question
//!    aborts the creation.
//! 3. Insert all questions in one transaction.
//!
//! Aborting in step 2 or a failed step 3 deletes the test again (compensating
//! delete), so a caller sees either a complete test or nothing at all.

use std::collections::HashSet;

use crate::{
    error::AppError,
    models::{
        assessment::{CreateTestRequest, Test, TestWithQuestions},
        question::{NewQuestion, QuestionInput, QuestionResponse},
    },
    services::guard::{authorize_course, authorize_test},
    store::AssessmentStore,
    utils::jwt::Principal,
};

/// Creates a test with its full question set, or nothing.
pub async fn create_assessment(
    store: &dyn AssessmentStore,
    principal: &Principal,
    req: CreateTestRequest,
) -> Result<TestWithQuestions, AppError> {
    let course_id = req
        .course_id
        .ok_or_else(|| AppError::BadRequest("Missing required fields: course_id".to_string()))?;
    authorize_course(store, principal, course_id).await?;

    let (new_test, inputs) = req.into_parts()?;

    let test = store.insert_test(&new_test).await?;

    let drafts = match build_questions(test.id, &inputs) {
        Ok(drafts) => drafts,
        Err(err) => {
            abort_creation(store, test.id, &err).await;
            return Err(err);
        }
    };

    let questions = match store.insert_questions(&drafts).await {
        Ok(questions) => questions,
        Err(err) => {
            abort_creation(store, test.id, &err).await;
            return Err(err);
        }
    };

    tracing::info!(
        test_id = test.id,
        course_id = test.course_id,
        questions = questions.len(),
        "Test created"
    );

    Ok(TestWithQuestions {
        test,
        questions: questions.into_iter().map(QuestionResponse::from).collect(),
    })
}

/// Validates every question input, stopping at the first invalid one.
fn build_questions(test_id: i64, inputs: &[QuestionInput]) -> Result<Vec<NewQuestion>, AppError> {
    let mut seen = HashSet::new();
    let mut drafts = Vec::with_capacity(inputs.len());

    for (i, input) in inputs.iter().enumerate() {
        let question = NewQuestion::from_input(test_id, input)
            .map_err(|e| AppError::BadRequest(format!("Question {}: {}", i + 1, e)))?;

        if !seen.insert(question.key()) {
            return Err(AppError::BadRequest(format!(
                "Question {}: duplicate question identifier {}",
                i + 1,
                question.identifier()
            )));
        }

        drafts.push(question);
    }

    Ok(drafts)
}

/// Compensating delete for a half-created test.
async fn abort_creation(store: &dyn AssessmentStore, test_id: i64, cause: &AppError) {
    match store.delete_test(test_id).await {
        Ok(_) => tracing::warn!(test_id, "Test creation aborted: {}", cause.message()),
        Err(e) => tracing::error!(
            test_id,
            "Failed to remove test after aborted creation ({}): {:?}",
            cause.message(),
            e
        ),
    }
}

/// Fetches a test with its questions ordered by number then sub-question.
pub async fn get_assessment(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
) -> Result<TestWithQuestions, AppError> {
    let test = authorize_test(store, principal, test_id).await?;
    let questions = store.list_questions(test.id).await?;

    Ok(TestWithQuestions {
        test,
        questions: questions.into_iter().map(QuestionResponse::from).collect(),
    })
}

pub async fn list_questions(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
) -> Result<Vec<QuestionResponse>, AppError> {
    let test = authorize_test(store, principal, test_id).await?;
    let questions = store.list_questions(test.id).await?;
    Ok(questions.into_iter().map(QuestionResponse::from).collect())
}

pub async fn list_course_tests(
    store: &dyn AssessmentStore,
    principal: &Principal,
    course_id: i64,
) -> Result<Vec<Test>, AppError> {
    let course = authorize_course(store, principal, course_id).await?;
    store.list_tests_for_course(course.id).await
}

/// Deletes a test with its questions and every mark recorded against it.
pub async fn delete_assessment(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
) -> Result<(), AppError> {
    let test = authorize_test(store, principal, test_id).await?;

    if !store.delete_test(test.id).await? {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    tracing::info!(test_id, "Test deleted");
    Ok(())
}
