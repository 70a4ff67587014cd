// src/models/mod.rs

pub mod assessment;
pub mod bulk;
pub mod course;
pub mod marks;
pub mod question;
pub mod raw_mark;
