// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::prelude::FromRow;

use crate::{
    config::{CO_COUNT, LAST_SUB_QUESTION, MAX_QUESTION_NUMBER, MIN_QUESTION_MARKS, MIN_QUESTION_NUMBER},
    error::AppError,
    utils::coerce,
};

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,
    pub test_id: i64,
    pub question_number: i32,
    /// Lowercase letter 'a'..='h', or NULL for an undivided question.
    pub sub_question: Option<String>,
    pub is_optional: bool,
    /// Course outcome this question assesses (1..=6).
    pub co: i32,
    pub max_marks: f64,
}

impl Question {
    /// Human-facing label, e.g. "5a" or "10".
    pub fn identifier(&self) -> String {
        question_identifier(self.question_number, self.sub_question.as_deref())
    }

    /// Natural key within a test.
    pub fn key(&self) -> (i32, Option<String>) {
        (self.question_number, self.sub_question.clone())
    }
}

/// Builds the display label from a question number and optional sub-letter.
pub fn question_identifier(question_number: i32, sub_question: Option<&str>) -> String {
    format!("{}{}", question_number, sub_question.unwrap_or(""))
}

/// Sorts by question number, then sub-question with undivided questions first.
pub fn sort_questions(questions: &mut [Question]) {
    questions.sort_by(|a, b| {
        (a.question_number, a.sub_question.as_deref())
            .cmp(&(b.question_number, b.sub_question.as_deref()))
    });
}

/// Why a question could not be constructed. Names the offending field.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionError {
    Missing(&'static str),
    InvalidNumber(String),
    InvalidSubQuestion(String),
    InvalidCo(String),
    InvalidMaxMarks(String),
}

impl fmt::Display for QuestionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionError::Missing(field) => write!(f, "{} is required", field),
            QuestionError::InvalidNumber(got) => write!(
                f,
                "question_number must be an integer between {} and {} (got {})",
                MIN_QUESTION_NUMBER, MAX_QUESTION_NUMBER, got
            ),
            QuestionError::InvalidSubQuestion(got) => write!(
                f,
                "sub_question must be a single letter between a and {} (got {})",
                LAST_SUB_QUESTION, got
            ),
            QuestionError::InvalidCo(got) => {
                write!(f, "co must be an integer between 1 and {} (got {})", CO_COUNT, got)
            }
            QuestionError::InvalidMaxMarks(got) => write!(
                f,
                "max_marks must be a number of at least {} (got {})",
                MIN_QUESTION_MARKS, got
            ),
        }
    }
}

impl std::error::Error for QuestionError {}

impl From<QuestionError> for AppError {
    fn from(err: QuestionError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Normalizes a sub-question letter: trims, lowercases, and maps blank to `None`.
pub fn normalize_sub_question(raw: &str) -> Result<Option<String>, QuestionError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let lower = trimmed.to_ascii_lowercase();
    let mut chars = lower.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if ('a'..=LAST_SUB_QUESTION).contains(&c) => Ok(Some(lower)),
        _ => Err(QuestionError::InvalidSubQuestion(raw.to_string())),
    }
}

/// A validated question that has not been persisted yet.
///
/// Fields are private: the only way to obtain one is through `new` or
/// `from_input`, so every instance satisfies the question invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    test_id: i64,
    question_number: i32,
    sub_question: Option<String>,
    is_optional: bool,
    co: i32,
    max_marks: f64,
}

impl NewQuestion {
    pub fn new(
        test_id: i64,
        question_number: i64,
        sub_question: Option<&str>,
        is_optional: bool,
        co: i64,
        max_marks: f64,
    ) -> Result<Self, QuestionError> {
        if !(MIN_QUESTION_NUMBER..=MAX_QUESTION_NUMBER).contains(&question_number) {
            return Err(QuestionError::InvalidNumber(question_number.to_string()));
        }

        let sub_question = match sub_question {
            Some(raw) => normalize_sub_question(raw)?,
            None => None,
        };

        if !(1..=CO_COUNT as i64).contains(&co) {
            return Err(QuestionError::InvalidCo(co.to_string()));
        }

        if !max_marks.is_finite() || max_marks < MIN_QUESTION_MARKS {
            return Err(QuestionError::InvalidMaxMarks(max_marks.to_string()));
        }

        Ok(Self {
            test_id,
            question_number: question_number as i32,
            sub_question,
            is_optional,
            co: co as i32,
            max_marks,
        })
    }

    /// Builds a question from a loosely typed request payload.
    pub fn from_input(test_id: i64, input: &QuestionInput) -> Result<Self, QuestionError> {
        let question_number = required_field(&input.question_number, "question_number")?;
        let question_number = coerce::as_integer(question_number)
            .ok_or_else(|| QuestionError::InvalidNumber(question_number.to_string()))?;

        let sub_question = if coerce::is_blank(input.sub_question.as_ref()) {
            None
        } else {
            match input.sub_question.as_ref() {
                Some(Value::String(s)) => Some(s.as_str()),
                Some(other) => return Err(QuestionError::InvalidSubQuestion(other.to_string())),
                None => None,
            }
        };

        let is_optional = input.is_optional.as_ref().is_some_and(coerce::as_bool);

        let co = required_field(&input.co, "co")?;
        let co = coerce::as_integer(co).ok_or_else(|| QuestionError::InvalidCo(co.to_string()))?;

        let max_marks = required_field(&input.max_marks, "max_marks")?;
        let max_marks = coerce::as_number(max_marks)
            .ok_or_else(|| QuestionError::InvalidMaxMarks(max_marks.to_string()))?;

        Self::new(test_id, question_number, sub_question, is_optional, co, max_marks)
    }

    pub fn test_id(&self) -> i64 {
        self.test_id
    }

    pub fn question_number(&self) -> i32 {
        self.question_number
    }

    pub fn sub_question(&self) -> Option<&str> {
        self.sub_question.as_deref()
    }

    pub fn is_optional(&self) -> bool {
        self.is_optional
    }

    pub fn co(&self) -> i32 {
        self.co
    }

    pub fn max_marks(&self) -> f64 {
        self.max_marks
    }

    pub fn identifier(&self) -> String {
        question_identifier(self.question_number, self.sub_question.as_deref())
    }

    pub fn key(&self) -> (i32, Option<String>) {
        (self.question_number, self.sub_question.clone())
    }
}

fn required_field<'a>(
    value: &'a Option<Value>,
    field: &'static str,
) -> Result<&'a Value, QuestionError> {
    if coerce::is_blank(value.as_ref()) {
        return Err(QuestionError::Missing(field));
    }
    value.as_ref().ok_or(QuestionError::Missing(field))
}

/// One question as sent by the client when creating a test.
/// Kept loosely typed so that a bad field is reported per question.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuestionInput {
    pub question_number: Option<Value>,
    pub sub_question: Option<Value>,
    pub is_optional: Option<Value>,
    pub co: Option<Value>,
    pub max_marks: Option<Value>,
}

/// DTO for sending a question to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionResponse {
    pub id: i64,
    pub test_id: i64,
    pub question_number: i32,
    pub sub_question: Option<String>,
    pub question_identifier: String,
    pub is_optional: bool,
    pub co: i32,
    pub max_marks: f64,
}

impl From<Question> for QuestionResponse {
    fn from(q: Question) -> Self {
        let question_identifier = q.identifier();
        Self {
            id: q.id,
            test_id: q.test_id,
            question_number: q.question_number,
            sub_question: q.sub_question,
            question_identifier,
            is_optional: q.is_optional,
            co: q.co,
            max_marks: q.max_marks,
        }
    }
}
