// src/models/marks.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{config::CO_COUNT, error::AppError, models::raw_mark::RawMarkDetail};

/// Per-course-outcome totals, indexed by CO number 1..=6.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoTotals([f64; CO_COUNT]);

impl CoTotals {
    pub fn new(values: [f64; CO_COUNT]) -> Self {
        Self(values)
    }

    pub fn zero() -> Self {
        Self::default()
    }

    fn slot(co: i32) -> Option<usize> {
        usize::try_from(co)
            .ok()
            .filter(|co| (1..=CO_COUNT).contains(co))
            .map(|co| co - 1)
    }

    /// Total for one outcome; `None` when `co` is outside 1..=6.
    pub fn get(&self, co: i32) -> Option<f64> {
        Self::slot(co).map(|i| self.0[i])
    }

    pub fn add(&mut self, co: i32, value: f64) -> Result<(), AppError> {
        let i = Self::slot(co).ok_or_else(|| invalid_co(co))?;
        self.0[i] += value;
        Ok(())
    }

    pub fn values(&self) -> [f64; CO_COUNT] {
        self.0
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Sums raw marks into their question's outcome. Outcomes with no
    /// marks stay at zero.
    pub fn from_raw_marks(rows: &[RawMarkDetail]) -> Result<Self, AppError> {
        let mut totals = Self::zero();
        for row in rows {
            totals.add(row.co, row.marks)?;
        }
        Ok(totals)
    }
}

fn invalid_co(co: i32) -> AppError {
    AppError::InternalServerError(format!("course outcome {} is out of range", co))
}

/// Represents the 'marks' table: one CO-aggregate row per student and test.
///
/// The row may have been derived from raw marks or entered by hand; the
/// table does not record which, and the latest write wins.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Marks {
    pub id: i64,
    pub student_id: i64,
    pub test_id: i64,
    #[serde(rename = "CO1")]
    pub co1: f64,
    #[serde(rename = "CO2")]
    pub co2: f64,
    #[serde(rename = "CO3")]
    pub co3: f64,
    #[serde(rename = "CO4")]
    pub co4: f64,
    #[serde(rename = "CO5")]
    pub co5: f64,
    #[serde(rename = "CO6")]
    pub co6: f64,
}

impl Marks {
    pub fn totals(&self) -> CoTotals {
        CoTotals([self.co1, self.co2, self.co3, self.co4, self.co5, self.co6])
    }

    pub fn from_totals(id: i64, test_id: i64, student_id: i64, totals: CoTotals) -> Self {
        let [co1, co2, co3, co4, co5, co6] = totals.values();
        Self {
            id,
            student_id,
            test_id,
            co1,
            co2,
            co3,
            co4,
            co5,
            co6,
        }
    }
}

/// DTO for entering CO totals directly, bypassing raw marks.
/// Every outcome must be supplied; use 0 for an outcome the test does not cover.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct SaveMarksByCoRequest {
    #[serde(rename = "CO1")]
    #[validate(range(min = 0.0, message = "CO1 cannot be negative."))]
    pub co1: Option<f64>,
    #[serde(rename = "CO2")]
    #[validate(range(min = 0.0, message = "CO2 cannot be negative."))]
    pub co2: Option<f64>,
    #[serde(rename = "CO3")]
    #[validate(range(min = 0.0, message = "CO3 cannot be negative."))]
    pub co3: Option<f64>,
    #[serde(rename = "CO4")]
    #[validate(range(min = 0.0, message = "CO4 cannot be negative."))]
    pub co4: Option<f64>,
    #[serde(rename = "CO5")]
    #[validate(range(min = 0.0, message = "CO5 cannot be negative."))]
    pub co5: Option<f64>,
    #[serde(rename = "CO6")]
    #[validate(range(min = 0.0, message = "CO6 cannot be negative."))]
    pub co6: Option<f64>,
}

impl SaveMarksByCoRequest {
    /// Checks that all six outcomes are present and non-negative.
    pub fn into_totals(self) -> Result<CoTotals, AppError> {
        let values = [self.co1, self.co2, self.co3, self.co4, self.co5, self.co6];

        let missing: Vec<String> = values
            .iter()
            .enumerate()
            .filter(|(_, value)| value.is_none())
            .map(|(i, _)| format!("CO{}", i + 1))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        self.validate()?;

        Ok(CoTotals(values.map(Option::unwrap_or_default)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(co: i32, marks: f64) -> RawMarkDetail {
        RawMarkDetail {
            id: 0,
            test_id: 1,
            student_id: 1,
            question_id: 0,
            marks,
            question_number: 1,
            sub_question: None,
            co,
            max_marks: 10.0,
        }
    }

    #[test]
    fn totals_sum_per_outcome() {
        let totals =
            CoTotals::from_raw_marks(&[raw(1, 5.0), raw(1, 3.0), raw(2, 2.0)]).unwrap();

        assert_eq!(totals.values(), [8.0, 2.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(totals.total(), 10.0);
    }

    #[test]
    fn outcome_index_is_bounds_checked() {
        let mut totals = CoTotals::zero();
        assert_eq!(totals.get(0), None);
        assert_eq!(totals.get(7), None);
        assert!(totals.add(7, 1.0).is_err());
        assert!(totals.add(-1, 1.0).is_err());

        totals.add(6, 4.5).unwrap();
        totals.add(6, 0.5).unwrap();
        assert_eq!(totals.get(6), Some(5.0));
    }

    #[test]
    fn marks_serialize_with_uppercase_outcome_keys() {
        let marks = Marks::from_totals(1, 2, 3, CoTotals::new([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        let value = serde_json::to_value(&marks).unwrap();

        assert_eq!(value["CO1"], json!(1.0));
        assert_eq!(value["CO6"], json!(6.0));
        assert_eq!(value["student_id"], json!(3));
        assert_eq!(value["test_id"], json!(2));
    }

    #[test]
    fn manual_entry_rejects_negative_outcomes() {
        let req: SaveMarksByCoRequest = serde_json::from_value(
            json!({ "CO1": 4, "CO2": 0, "CO3": -1, "CO4": 0, "CO5": 0, "CO6": 0 }),
        )
        .unwrap();
        assert!(matches!(req.into_totals(), Err(AppError::BadRequest(_))));

        let req: SaveMarksByCoRequest = serde_json::from_value(
            json!({ "CO1": 0, "CO2": 7.5, "CO3": 0, "CO4": 0, "CO5": 0, "CO6": 1 }),
        )
        .unwrap();
        assert_eq!(req.into_totals().unwrap().values(), [0.0, 7.5, 0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn manual_entry_requires_every_outcome() {
        let req: SaveMarksByCoRequest =
            serde_json::from_value(json!({ "co1": 5, "CO2": 3 })).unwrap();
        let err = req.into_totals().unwrap_err();
        assert!(
            matches!(&err, AppError::BadRequest(msg) if msg == "Missing required fields: CO1, CO3, CO4, CO5, CO6")
        );

        let req: SaveMarksByCoRequest = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(req.into_totals(), Err(AppError::BadRequest(_))));
    }
}
