// src/services/mod.rs

//! Core operations of the assessment subsystem. Every public operation takes
//! the acting `Principal` explicitly and checks course ownership first.

pub mod aggregation;
pub mod assessment;
pub mod bulk;
pub mod guard;
pub mod marks;
