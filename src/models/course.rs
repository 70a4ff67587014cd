// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'courses' table. Courses are managed elsewhere;
/// assessments only need to know who teaches them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub course_code: String,
    pub name: String,
    /// Employee ID of the faculty member who owns the course.
    pub faculty_id: i64,
}

/// Represents the 'students' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    /// Institutional roll number, unique across the institution.
    pub rollno: String,
    pub name: String,
}
