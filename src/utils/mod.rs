// src/utils/mod.rs

pub mod coerce;
pub mod jwt;
