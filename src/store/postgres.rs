// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

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

const TEST_COLUMNS: &str = "id, course_id, name, full_marks, pass_marks, question_link, \
     question_paper_filename, has_question_paper_pdf, created_at";
const QUESTION_COLUMNS: &str =
    "id, test_id, question_number, sub_question, is_optional, co, max_marks";
const RAW_MARK_COLUMNS: &str = "id, test_id, student_id, question_id, marks";
const MARKS_COLUMNS: &str = "id, student_id, test_id, co1, co2, co3, co4, co5, co6";

const UPSERT_RAW_MARK: &str = r#"
    INSERT INTO raw_marks (test_id, student_id, question_id, marks)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (test_id, student_id, question_id) DO UPDATE SET
        marks = EXCLUDED.marks,
        updated_at = CURRENT_TIMESTAMP
    RETURNING id, test_id, student_id, question_id, marks
"#;

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[async_trait]
impl AssessmentStore for PgStore {
    async fn find_course(&self, course_id: i64) -> Result<Option<Course>, AppError> {
        let course = sqlx::query_as::<_, Course>(
            "SELECT id, course_code, name, faculty_id FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    async fn find_student(&self, student_id: i64) -> Result<Option<Student>, AppError> {
        let student =
            sqlx::query_as::<_, Student>("SELECT id, rollno, name FROM students WHERE id = $1")
                .bind(student_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(student)
    }

    async fn find_student_by_rollno(&self, rollno: &str) -> Result<Option<Student>, AppError> {
        let student =
            sqlx::query_as::<_, Student>("SELECT id, rollno, name FROM students WHERE rollno = $1")
                .bind(rollno)
                .fetch_optional(&self.pool)
                .await?;

        Ok(student)
    }

    async fn insert_test(&self, test: &NewTest) -> Result<Test, AppError> {
        let test = sqlx::query_as::<_, Test>(&format!(
            "INSERT INTO tests (course_id, name, full_marks, pass_marks, question_link)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            TEST_COLUMNS
        ))
        .bind(test.course_id)
        .bind(&test.name)
        .bind(test.full_marks)
        .bind(test.pass_marks)
        .bind(&test.question_link)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert test: {:?}", e);
            AppError::from(e)
        })?;

        Ok(test)
    }

    async fn find_test(&self, test_id: i64) -> Result<Option<Test>, AppError> {
        let test = sqlx::query_as::<_, Test>(&format!(
            "SELECT {} FROM tests WHERE id = $1",
            TEST_COLUMNS
        ))
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(test)
    }

    async fn list_tests_for_course(&self, course_id: i64) -> Result<Vec<Test>, AppError> {
        let tests = sqlx::query_as::<_, Test>(&format!(
            "SELECT {} FROM tests WHERE course_id = $1 ORDER BY id",
            TEST_COLUMNS
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tests)
    }

    async fn delete_test(&self, test_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tests WHERE id = $1")
            .bind(test_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_questions(&self, questions: &[NewQuestion]) -> Result<Vec<Question>, AppError> {
        if questions.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO questions (test_id, question_number, sub_question, is_optional, co, max_marks) ",
        );
        builder.push_values(questions, |mut row, q| {
            row.push_bind(q.test_id())
                .push_bind(q.question_number())
                .push_bind(q.sub_question().map(str::to_string))
                .push_bind(q.is_optional())
                .push_bind(q.co())
                .push_bind(q.max_marks());
        });
        builder.push(" RETURNING ");
        builder.push(QUESTION_COLUMNS);

        let inserted = builder
            .build_query_as::<Question>()
            .fetch_all(&mut *tx)
            .await;

        let mut inserted = match inserted {
            Ok(rows) => rows,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!("Failed to roll back question insert: {:?}", rollback);
                }
                if is_unique_violation(&e) {
                    return Err(AppError::Conflict(
                        "Duplicate question identifier in this test".to_string(),
                    ));
                }
                tracing::error!("Failed to insert questions: {:?}", e);
                return Err(AppError::from(e));
            }
        };

        tx.commit().await?;

        sort_questions(&mut inserted);
        Ok(inserted)
    }

    async fn list_questions(&self, test_id: i64) -> Result<Vec<Question>, AppError> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {} FROM questions WHERE test_id = $1
             ORDER BY question_number, sub_question NULLS FIRST",
            QUESTION_COLUMNS
        ))
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    async fn find_question(&self, question_id: i64) -> Result<Option<Question>, AppError> {
        let question = sqlx::query_as::<_, Question>(&format!(
            "SELECT {} FROM questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(question)
    }

    async fn upsert_raw_mark(
        &self,
        test_id: i64,
        student_id: i64,
        question_id: i64,
        marks: f64,
    ) -> Result<RawMark, AppError> {
        let row = sqlx::query_as::<_, RawMark>(UPSERT_RAW_MARK)
            .bind(test_id)
            .bind(student_id)
            .bind(question_id)
            .bind(marks)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to upsert raw mark: {:?}", e);
                AppError::from(e)
            })?;

        Ok(row)
    }

    async fn upsert_raw_marks(
        &self,
        test_id: i64,
        student_id: i64,
        marks: &[(i64, f64)],
    ) -> Result<Vec<RawMark>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(marks.len());

        // One statement per row: a multi-row upsert cannot touch the same key twice.
        for &(question_id, value) in marks {
            let row = sqlx::query_as::<_, RawMark>(UPSERT_RAW_MARK)
                .bind(test_id)
                .bind(student_id)
                .bind(question_id)
                .bind(value)
                .fetch_one(&mut *tx)
                .await;

            match row {
                Ok(row) => saved.push(row),
                Err(e) => {
                    tracing::error!("Failed to upsert raw marks, rolling back: {:?}", e);
                    if let Err(rollback) = tx.rollback().await {
                        tracing::error!("Rollback failed: {:?}", rollback);
                    }
                    return Err(AppError::from(e));
                }
            }
        }

        tx.commit().await?;
        Ok(saved)
    }

    async fn find_raw_mark(&self, raw_mark_id: i64) -> Result<Option<RawMark>, AppError> {
        let row = sqlx::query_as::<_, RawMark>(&format!(
            "SELECT {} FROM raw_marks WHERE id = $1",
            RAW_MARK_COLUMNS
        ))
        .bind(raw_mark_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_raw_marks(
        &self,
        test_id: i64,
        student_id: i64,
    ) -> Result<Vec<RawMarkDetail>, AppError> {
        let rows = sqlx::query_as::<_, RawMarkDetail>(
            r#"
            SELECT
                rm.id, rm.test_id, rm.student_id, rm.question_id, rm.marks,
                q.question_number, q.sub_question, q.co, q.max_marks
            FROM raw_marks rm
            JOIN questions q ON q.id = rm.question_id
            WHERE rm.test_id = $1 AND rm.student_id = $2
            ORDER BY q.question_number, q.sub_question NULLS FIRST
            "#,
        )
        .bind(test_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn delete_raw_mark(&self, raw_mark_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM raw_marks WHERE id = $1")
            .bind(raw_mark_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_raw_marks(&self, test_id: i64, student_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM raw_marks WHERE test_id = $1 AND student_id = $2")
            .bind(test_id)
            .bind(student_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn upsert_marks(
        &self,
        test_id: i64,
        student_id: i64,
        totals: CoTotals,
    ) -> Result<Marks, AppError> {
        let [co1, co2, co3, co4, co5, co6] = totals.values();

        let marks = sqlx::query_as::<_, Marks>(&format!(
            r#"
            INSERT INTO marks (student_id, test_id, co1, co2, co3, co4, co5, co6)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (test_id, student_id) DO UPDATE SET
                co1 = EXCLUDED.co1,
                co2 = EXCLUDED.co2,
                co3 = EXCLUDED.co3,
                co4 = EXCLUDED.co4,
                co5 = EXCLUDED.co5,
                co6 = EXCLUDED.co6,
                updated_at = CURRENT_TIMESTAMP
            RETURNING {}
            "#,
            MARKS_COLUMNS
        ))
        .bind(student_id)
        .bind(test_id)
        .bind(co1)
        .bind(co2)
        .bind(co3)
        .bind(co4)
        .bind(co5)
        .bind(co6)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert marks: {:?}", e);
            AppError::from(e)
        })?;

        Ok(marks)
    }

    async fn find_marks(&self, test_id: i64, student_id: i64) -> Result<Option<Marks>, AppError> {
        let marks = sqlx::query_as::<_, Marks>(&format!(
            "SELECT {} FROM marks WHERE test_id = $1 AND student_id = $2",
            MARKS_COLUMNS
        ))
        .bind(test_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(marks)
    }

    async fn list_marks(&self, test_id: i64) -> Result<Vec<Marks>, AppError> {
        let marks = sqlx::query_as::<_, Marks>(&format!(
            "SELECT {} FROM marks WHERE test_id = $1 ORDER BY student_id",
            MARKS_COLUMNS
        ))
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(marks)
    }

    async fn delete_student_marks(
        &self,
        test_id: i64,
        student_id: i64,
    ) -> Result<(u64, bool), AppError> {
        let mut tx = self.pool.begin().await?;

        let raw = sqlx::query("DELETE FROM raw_marks WHERE test_id = $1 AND student_id = $2")
            .bind(test_id)
            .bind(student_id)
            .execute(&mut *tx)
            .await?;
        let marks = sqlx::query("DELETE FROM marks WHERE test_id = $1 AND student_id = $2")
            .bind(test_id)
            .bind(student_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((raw.rows_affected(), marks.rows_affected() > 0))
    }
}
