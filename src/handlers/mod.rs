// src/handlers/mod.rs

pub mod assessment;
pub mod marks;
