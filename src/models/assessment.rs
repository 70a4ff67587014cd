// src/models/assessment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{QuestionInput, QuestionResponse},
};

/// Represents the 'tests' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Test {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
    pub full_marks: f64,
    pub pass_marks: f64,
    pub question_link: Option<String>,
    pub question_paper_filename: Option<String>,
    pub has_question_paper_pdf: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A test row ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTest {
    pub course_id: i64,
    pub name: String,
    pub full_marks: f64,
    pub pass_marks: f64,
    pub question_link: Option<String>,
}

/// DTO for creating a test together with its question paper.
///
/// Top-level fields are optional at the serde level so that a missing field
/// is reported by name instead of as a generic JSON rejection.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct CreateTestRequest {
    pub course_id: Option<i64>,
    #[validate(length(max = 100, message = "Test name must be at most 100 characters."))]
    pub name: Option<String>,
    #[validate(range(exclusive_min = 0.0, message = "full_marks must be greater than 0."))]
    pub full_marks: Option<f64>,
    #[validate(range(min = 0.0, message = "pass_marks cannot be negative."))]
    pub pass_marks: Option<f64>,
    #[validate(url(message = "question_link must be a valid URL."))]
    pub question_link: Option<String>,
    pub questions: Option<Vec<QuestionInput>>,
}

impl CreateTestRequest {
    /// Checks presence and ranges of the top-level fields and splits the
    /// request into the test row and the raw question list.
    pub fn into_parts(self) -> Result<(NewTest, Vec<QuestionInput>), AppError> {
        let mut missing = Vec::new();
        if self.course_id.is_none() {
            missing.push("course_id");
        }
        if self.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            missing.push("name");
        }
        if self.full_marks.is_none() {
            missing.push("full_marks");
        }
        if self.pass_marks.is_none() {
            missing.push("pass_marks");
        }
        if self.questions.is_none() {
            missing.push("questions");
        }
        if !missing.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        self.validate()?;

        let (Some(course_id), Some(name), Some(full_marks), Some(pass_marks), Some(questions)) = (
            self.course_id,
            self.name,
            self.full_marks,
            self.pass_marks,
            self.questions,
        ) else {
            return Err(AppError::BadRequest("Missing required fields".to_string()));
        };

        if pass_marks > full_marks {
            return Err(AppError::BadRequest(
                "pass_marks cannot exceed full_marks.".to_string(),
            ));
        }

        if questions.is_empty() {
            return Err(AppError::BadRequest(
                "A test needs at least one question.".to_string(),
            ));
        }

        let question_link = self
            .question_link
            .map(|link| link.trim().to_string())
            .filter(|link| !link.is_empty());

        Ok((
            NewTest {
                course_id,
                name: name.trim().to_string(),
                full_marks,
                pass_marks,
                question_link,
            },
            questions,
        ))
    }
}

/// A test with its question paper, questions ordered by number then sub-question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestWithQuestions {
    #[serde(flatten)]
    pub test: Test,
    pub questions: Vec<QuestionResponse>,
}
