// src/services/bulk.rs

//! Multi-student marks upload.
//!
//! Unlike the per-student answer sheet, a bulk upload is best effort per row:
//! each entry is validated and saved on its own, and a bad entry is reported
//! in the result without affecting the others. CO totals are refreshed once
//! per touched student after all rows are processed. A failed refresh is
//! logged and reported separately; the saved raw marks stay saved.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::{
    config::MAX_BULK_ENTRIES,
    error::AppError,
    models::{
        bulk::{AggregationFailure, BulkSaveResult, BulkSuccess},
        course::Student,
        question::{Question, normalize_sub_question},
    },
    services::{aggregation::aggregate_from_raw_marks, guard::authorize_test, marks::validate_marks},
    store::AssessmentStore,
    utils::{coerce, jwt::Principal},
};

const REQUIRED_FIELDS: [&str; 3] = ["student_rollno", "question_number", "marks_obtained"];

/// One upload row after shape validation.
struct ParsedEntry<'a> {
    rollno: String,
    question_number: i64,
    sub_question: Option<String>,
    marks: &'a Value,
}

/// Validates the shape of one entry. Returns the reason on failure.
fn parse_entry(entry: &Value) -> Result<ParsedEntry<'_>, String> {
    let Some(fields) = entry.as_object() else {
        return Err("Entry must be an object".to_string());
    };

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| coerce::is_blank(fields.get(*field)))
        .collect();
    if !missing.is_empty() {
        return Err(format!("Missing required fields: {}", missing.join(", ")));
    }

    let raw_rollno = &fields["student_rollno"];
    let rollno = coerce::as_text(raw_rollno)
        .ok_or_else(|| format!("Invalid student_rollno: {}", raw_rollno))?;

    let raw_number = &fields["question_number"];
    let question_number = coerce::as_integer(raw_number)
        .ok_or_else(|| format!("Invalid question_number: {}", raw_number))?;

    let sub_question = match fields.get("sub_question") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => normalize_sub_question(s).map_err(|e| e.to_string())?,
        Some(other) => return Err(format!("Invalid sub_question: {}", other)),
    };

    Ok(ParsedEntry {
        rollno,
        question_number,
        sub_question,
        marks: &fields["marks_obtained"],
    })
}

/// Saves marks for many students, one row at a time.
///
/// Only problems with the upload as a whole (unknown test, foreign course,
/// empty or oversized payload) are returned as errors.
pub async fn bulk_save_marks(
    store: &dyn AssessmentStore,
    principal: &Principal,
    test_id: i64,
    entries: Vec<Value>,
) -> Result<BulkSaveResult, AppError> {
    authorize_test(store, principal, test_id).await?;

    if entries.is_empty() {
        return Err(AppError::BadRequest("entries must be a non-empty array".to_string()));
    }
    if entries.len() > MAX_BULK_ENTRIES {
        return Err(AppError::BadRequest(format!(
            "A single upload accepts at most {} entries (got {})",
            MAX_BULK_ENTRIES,
            entries.len()
        )));
    }

    let questions: HashMap<(i32, Option<String>), Question> = store
        .list_questions(test_id)
        .await?
        .into_iter()
        .map(|q| (q.key(), q))
        .collect();

    let mut result = BulkSaveResult::new(entries.len());
    let mut students: HashMap<String, Option<Student>> = HashMap::new();
    // Ordered so aggregation runs in a stable order.
    let mut touched: BTreeMap<i64, String> = BTreeMap::new();

    for (index, entry) in entries.iter().enumerate() {
        let parsed = match parse_entry(entry) {
            Ok(parsed) => parsed,
            Err(reason) => {
                tracing::debug!(test_id, index, "Bulk entry rejected: {}", reason);
                result.fail(index, entry, reason);
                continue;
            }
        };

        let student = match students.get(&parsed.rollno) {
            Some(cached) => cached.clone(),
            None => match store.find_student_by_rollno(&parsed.rollno).await {
                Ok(found) => {
                    students.insert(parsed.rollno.clone(), found.clone());
                    found
                }
                Err(e) => {
                    tracing::error!(test_id, index, "Failed to look up student: {:?}", e);
                    result.fail(index, entry, format!("Failed to look up student: {}", e.message()));
                    continue;
                }
            },
        };
        let Some(student) = student else {
            result.fail(index, entry, format!("Student {} not found", parsed.rollno));
            continue;
        };

        let label = format!(
            "{}{}",
            parsed.question_number,
            parsed.sub_question.as_deref().unwrap_or("")
        );
        let question = i32::try_from(parsed.question_number)
            .ok()
            .and_then(|number| questions.get(&(number, parsed.sub_question.clone())));
        let Some(question) = question else {
            result.fail(index, entry, format!("Question {} not found in this test", label));
            continue;
        };

        let marks = match validate_marks(parsed.marks, question) {
            Ok(marks) => marks,
            Err(reason) => {
                result.fail(index, entry, reason);
                continue;
            }
        };

        if let Err(e) = store
            .upsert_raw_mark(test_id, student.id, question.id, marks)
            .await
        {
            tracing::error!(test_id, index, "Failed to save bulk entry: {:?}", e);
            result.fail(index, entry, format!("Failed to save marks: {}", e.message()));
            continue;
        }

        touched.insert(student.id, student.rollno.clone());
        result.succeed(BulkSuccess {
            index,
            student_id: student.id,
            student_rollno: student.rollno,
            question_id: question.id,
            question_identifier: question.identifier(),
            marks_obtained: marks,
        });
    }

    for (student_id, rollno) in &touched {
        if let Err(e) = aggregate_from_raw_marks(store, test_id, *student_id).await {
            tracing::error!(
                test_id,
                student_id,
                rollno = rollno.as_str(),
                "CO aggregation failed after bulk upload: {:?}",
                e
            );
            result.aggregation_failures.push(AggregationFailure {
                student_id: *student_id,
                reason: e.message().to_string(),
            });
        }
    }

    tracing::info!(
        test_id,
        total = result.total,
        saved = result.success_count,
        failed = result.failure_count,
        students = touched.len(),
        "Bulk marks upload processed"
    );

    Ok(result)
}
