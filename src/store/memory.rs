// src/store/memory.rs

//! In-process store for tests and local demos.
//!
//! Mirrors the relational constraints of the Postgres schema: natural-key
//! uniqueness, foreign keys, cascading deletes, and all-or-nothing batch
//! writes. Unit tests can inject faults to exercise the failure paths of
//! the ingestion code.

use std::{
    collections::{BTreeMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        assessment::{NewTest, Test},
        course::{Course, Student},
        marks::{CoTotals, Marks},
        question::{NewQuestion, Question, sort_questions},
        raw_mark::{RawMark, RawMarkDetail},
    },
    store::AssessmentStore,
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    courses: BTreeMap<i64, Course>,
    students: BTreeMap<i64, Student>,
    tests: BTreeMap<i64, Test>,
    questions: BTreeMap<i64, Question>,
    raw_marks: BTreeMap<i64, RawMark>,
    marks: BTreeMap<i64, Marks>,
    #[cfg(test)]
    faults: Faults,
}

#[cfg(test)]
#[derive(Default)]
struct Faults {
    question_inserts: bool,
    marks_for_students: HashSet<i64>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    #[cfg(test)]
    fn question_insert_fault(&self) -> Result<(), AppError> {
        if self.faults.question_inserts {
            return Err(AppError::InternalServerError(
                "connection lost during question insert".to_string(),
            ));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn question_insert_fault(&self) -> Result<(), AppError> {
        Ok(())
    }

    #[cfg(test)]
    fn marks_fault(&self, student_id: i64) -> Result<(), AppError> {
        if self.faults.marks_for_students.contains(&student_id) {
            return Err(AppError::InternalServerError(
                "marks write rejected by store".to_string(),
            ));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn marks_fault(&self, _student_id: i64) -> Result<(), AppError> {
        Ok(())
    }

    fn foreign_key(&self, test_id: i64, student_id: i64, question_id: i64) -> Result<(), AppError> {
        if !self.tests.contains_key(&test_id) {
            return Err(fk_violation("raw_marks.test_id"));
        }
        if !self.students.contains_key(&student_id) {
            return Err(fk_violation("raw_marks.student_id"));
        }
        if !self.questions.contains_key(&question_id) {
            return Err(fk_violation("raw_marks.question_id"));
        }
        Ok(())
    }

    fn upsert_raw(&mut self, test_id: i64, student_id: i64, question_id: i64, marks: f64) -> RawMark {
        let existing = self.raw_marks.values_mut().find(|r| {
            r.test_id == test_id && r.student_id == student_id && r.question_id == question_id
        });

        if let Some(row) = existing {
            row.marks = marks;
            return row.clone();
        }

        let row = RawMark {
            id: self.next_id(),
            test_id,
            student_id,
            question_id,
            marks,
        };
        self.raw_marks.insert(row.id, row.clone());
        row
    }
}

fn fk_violation(column: &str) -> AppError {
    AppError::InternalServerError(format!("foreign key violation on {}", column))
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation completes before the guard drops, so a poisoned lock
    // still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_course(&self, course_code: &str, name: &str, faculty_id: i64) -> Course {
        let mut inner = self.lock();
        let course = Course {
            id: inner.next_id(),
            course_code: course_code.to_string(),
            name: name.to_string(),
            faculty_id,
        };
        inner.courses.insert(course.id, course.clone());
        course
    }

    pub fn add_student(&self, rollno: &str, name: &str) -> Student {
        let mut inner = self.lock();
        let student = Student {
            id: inner.next_id(),
            rollno: rollno.to_string(),
            name: name.to_string(),
        };
        inner.students.insert(student.id, student.clone());
        student
    }

    /// Makes every subsequent question batch insert fail, as a broken
    /// connection mid-transaction would.
    #[cfg(test)]
    pub fn fail_question_inserts(&self, fail: bool) {
        self.lock().faults.question_inserts = fail;
    }

    /// Makes CO-aggregate writes and deletes for one student fail.
    #[cfg(test)]
    pub fn fail_marks_for_student(&self, student_id: i64) {
        self.lock().faults.marks_for_students.insert(student_id);
    }

    pub fn test_count(&self) -> usize {
        self.lock().tests.len()
    }

    pub fn question_count(&self) -> usize {
        self.lock().questions.len()
    }

    pub fn raw_mark_count(&self) -> usize {
        self.lock().raw_marks.len()
    }

    pub fn marks_count(&self) -> usize {
        self.lock().marks.len()
    }
}

#[async_trait]
impl AssessmentStore for MemoryStore {
    async fn find_course(&self, course_id: i64) -> Result<Option<Course>, AppError> {
        Ok(self.lock().courses.get(&course_id).cloned())
    }

    async fn find_student(&self, student_id: i64) -> Result<Option<Student>, AppError> {
        Ok(self.lock().students.get(&student_id).cloned())
    }

    async fn find_student_by_rollno(&self, rollno: &str) -> Result<Option<Student>, AppError> {
        Ok(self
            .lock()
            .students
            .values()
            .find(|s| s.rollno == rollno)
            .cloned())
    }

    async fn insert_test(&self, test: &NewTest) -> Result<Test, AppError> {
        let mut inner = self.lock();
        if !inner.courses.contains_key(&test.course_id) {
            return Err(fk_violation("tests.course_id"));
        }

        let row = Test {
            id: inner.next_id(),
            course_id: test.course_id,
            name: test.name.clone(),
            full_marks: test.full_marks,
            pass_marks: test.pass_marks,
            question_link: test.question_link.clone(),
            question_paper_filename: None,
            has_question_paper_pdf: false,
            created_at: Some(Utc::now()),
        };
        inner.tests.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_test(&self, test_id: i64) -> Result<Option<Test>, AppError> {
        Ok(self.lock().tests.get(&test_id).cloned())
    }

    async fn list_tests_for_course(&self, course_id: i64) -> Result<Vec<Test>, AppError> {
        Ok(self
            .lock()
            .tests
            .values()
            .filter(|t| t.course_id == course_id)
            .cloned()
            .collect())
    }

    async fn delete_test(&self, test_id: i64) -> Result<bool, AppError> {
        let mut inner = self.lock();
        if inner.tests.remove(&test_id).is_none() {
            return Ok(false);
        }
        inner.questions.retain(|_, q| q.test_id != test_id);
        inner.raw_marks.retain(|_, r| r.test_id != test_id);
        inner.marks.retain(|_, m| m.test_id != test_id);
        Ok(true)
    }

    async fn insert_questions(&self, questions: &[NewQuestion]) -> Result<Vec<Question>, AppError> {
        let mut inner = self.lock();
        inner.question_insert_fault()?;

        let mut seen: HashSet<(i64, (i32, Option<String>))> = inner
            .questions
            .values()
            .map(|q| (q.test_id, q.key()))
            .collect();

        for q in questions {
            if !inner.tests.contains_key(&q.test_id()) {
                return Err(fk_violation("questions.test_id"));
            }
            if !seen.insert((q.test_id(), q.key())) {
                return Err(AppError::Conflict(
                    "Duplicate question identifier in this test".to_string(),
                ));
            }
        }

        let mut inserted = Vec::with_capacity(questions.len());
        for q in questions {
            let row = Question {
                id: inner.next_id(),
                test_id: q.test_id(),
                question_number: q.question_number(),
                sub_question: q.sub_question().map(str::to_string),
                is_optional: q.is_optional(),
                co: q.co(),
                max_marks: q.max_marks(),
            };
            inner.questions.insert(row.id, row.clone());
            inserted.push(row);
        }

        sort_questions(&mut inserted);
        Ok(inserted)
    }

    async fn list_questions(&self, test_id: i64) -> Result<Vec<Question>, AppError> {
        let mut questions: Vec<Question> = self
            .lock()
            .questions
            .values()
            .filter(|q| q.test_id == test_id)
            .cloned()
            .collect();
        sort_questions(&mut questions);
        Ok(questions)
    }

    async fn find_question(&self, question_id: i64) -> Result<Option<Question>, AppError> {
        Ok(self.lock().questions.get(&question_id).cloned())
    }

    async fn upsert_raw_mark(
        &self,
        test_id: i64,
        student_id: i64,
        question_id: i64,
        marks: f64,
    ) -> Result<RawMark, AppError> {
        let mut inner = self.lock();
        inner.foreign_key(test_id, student_id, question_id)?;
        Ok(inner.upsert_raw(test_id, student_id, question_id, marks))
    }

    async fn upsert_raw_marks(
        &self,
        test_id: i64,
        student_id: i64,
        marks: &[(i64, f64)],
    ) -> Result<Vec<RawMark>, AppError> {
        let mut inner = self.lock();
        for &(question_id, _) in marks {
            inner.foreign_key(test_id, student_id, question_id)?;
        }

        Ok(marks
            .iter()
            .map(|&(question_id, value)| inner.upsert_raw(test_id, student_id, question_id, value))
            .collect())
    }

    async fn find_raw_mark(&self, raw_mark_id: i64) -> Result<Option<RawMark>, AppError> {
        Ok(self.lock().raw_marks.get(&raw_mark_id).cloned())
    }

    async fn list_raw_marks(
        &self,
        test_id: i64,
        student_id: i64,
    ) -> Result<Vec<RawMarkDetail>, AppError> {
        let inner = self.lock();
        let mut rows: Vec<RawMarkDetail> = inner
            .raw_marks
            .values()
            .filter(|r| r.test_id == test_id && r.student_id == student_id)
            .filter_map(|r| {
                inner.questions.get(&r.question_id).map(|q| RawMarkDetail {
                    id: r.id,
                    test_id: r.test_id,
                    student_id: r.student_id,
                    question_id: r.question_id,
                    marks: r.marks,
                    question_number: q.question_number,
                    sub_question: q.sub_question.clone(),
                    co: q.co,
                    max_marks: q.max_marks,
                })
            })
            .collect();

        rows.sort_by(|a, b| {
            (a.question_number, a.sub_question.as_deref())
                .cmp(&(b.question_number, b.sub_question.as_deref()))
        });
        Ok(rows)
    }

    async fn delete_raw_mark(&self, raw_mark_id: i64) -> Result<bool, AppError> {
        Ok(self.lock().raw_marks.remove(&raw_mark_id).is_some())
    }

    async fn delete_raw_marks(&self, test_id: i64, student_id: i64) -> Result<u64, AppError> {
        let mut inner = self.lock();
        let before = inner.raw_marks.len();
        inner
            .raw_marks
            .retain(|_, r| !(r.test_id == test_id && r.student_id == student_id));
        Ok((before - inner.raw_marks.len()) as u64)
    }

    async fn upsert_marks(
        &self,
        test_id: i64,
        student_id: i64,
        totals: CoTotals,
    ) -> Result<Marks, AppError> {
        let mut inner = self.lock();
        inner.marks_fault(student_id)?;
        if !inner.tests.contains_key(&test_id) {
            return Err(fk_violation("marks.test_id"));
        }
        if !inner.students.contains_key(&student_id) {
            return Err(fk_violation("marks.student_id"));
        }

        let existing = inner
            .marks
            .values()
            .find(|m| m.test_id == test_id && m.student_id == student_id)
            .map(|m| m.id);

        let id = match existing {
            Some(id) => id,
            None => inner.next_id(),
        };
        let row = Marks::from_totals(id, test_id, student_id, totals);
        inner.marks.insert(id, row.clone());
        Ok(row)
    }

    async fn find_marks(&self, test_id: i64, student_id: i64) -> Result<Option<Marks>, AppError> {
        Ok(self
            .lock()
            .marks
            .values()
            .find(|m| m.test_id == test_id && m.student_id == student_id)
            .cloned())
    }

    async fn list_marks(&self, test_id: i64) -> Result<Vec<Marks>, AppError> {
        let mut marks: Vec<Marks> = self
            .lock()
            .marks
            .values()
            .filter(|m| m.test_id == test_id)
            .cloned()
            .collect();
        marks.sort_by_key(|m| m.student_id);
        Ok(marks)
    }

    async fn delete_student_marks(
        &self,
        test_id: i64,
        student_id: i64,
    ) -> Result<(u64, bool), AppError> {
        let mut inner = self.lock();
        inner.marks_fault(student_id)?;

        let raw_before = inner.raw_marks.len();
        inner
            .raw_marks
            .retain(|_, r| !(r.test_id == test_id && r.student_id == student_id));
        let marks_before = inner.marks.len();
        inner
            .marks
            .retain(|_, m| !(m.test_id == test_id && m.student_id == student_id));

        Ok((
            (raw_before - inner.raw_marks.len()) as u64,
            inner.marks.len() < marks_before,
        ))
    }
}
