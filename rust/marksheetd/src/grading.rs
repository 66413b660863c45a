use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One grading tier: percentages at or above `min_percent` (and below the next
/// higher tier) earn `letter` / `grade_point`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "BoundarySpec")]
pub struct GradeBoundary {
    pub min_percent: f64,
    pub letter: String,
    pub grade_point: f64,
}

impl GradeBoundary {
    pub fn new(min_percent: f64, letter: &str, grade_point: f64) -> Self {
        Self {
            min_percent,
            letter: letter.to_string(),
            grade_point,
        }
    }
}

/// Boundaries arrive either as `[90, "A", 10]` or as an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum BoundarySpec {
    Tuple(f64, String, f64),
    #[serde(rename_all = "camelCase")]
    Object {
        min_percent: f64,
        letter: String,
        grade_point: f64,
    },
}

impl From<BoundarySpec> for GradeBoundary {
    fn from(spec: BoundarySpec) -> Self {
        match spec {
            BoundarySpec::Tuple(min_percent, letter, grade_point) => Self {
                min_percent,
                letter,
                grade_point,
            },
            BoundarySpec::Object {
                min_percent,
                letter,
                grade_point,
            } => Self {
                min_percent,
                letter,
                grade_point,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub letter: String,
    pub grade_point: f64,
}

/// A validated boundary table, highest threshold first.
#[derive(Debug, Clone, PartialEq)]
pub struct GradingPolicy {
    boundaries: Vec<GradeBoundary>,
}

impl GradingPolicy {
    pub fn new(mut boundaries: Vec<GradeBoundary>) -> Result<Self, CoreError> {
        if boundaries.is_empty() {
            return Err(CoreError::InvalidPolicy("grade boundary table is empty".into()));
        }

        let mut letters = HashSet::new();
        for b in &boundaries {
            if !b.min_percent.is_finite() || !(0.0..=100.0).contains(&b.min_percent) {
                return Err(CoreError::InvalidPolicy(format!(
                    "boundary {:?}: minimum percentage must be within [0, 100]",
                    b.letter
                )));
            }
            if b.letter.trim().is_empty() {
                return Err(CoreError::InvalidPolicy(format!(
                    "boundary at {}: letter must not be blank",
                    b.min_percent
                )));
            }
            if !b.grade_point.is_finite() || b.grade_point < 0.0 {
                return Err(CoreError::InvalidPolicy(format!(
                    "boundary {:?}: grade point must be a non-negative number",
                    b.letter
                )));
            }
            if !letters.insert(b.letter.trim().to_string()) {
                return Err(CoreError::InvalidPolicy(format!(
                    "letter {:?} appears more than once",
                    b.letter
                )));
            }
        }

        boundaries.sort_by(|a, b| b.min_percent.total_cmp(&a.min_percent));

        for pair in boundaries.windows(2) {
            let (upper, lower) = (&pair[0], &pair[1]);
            if upper.min_percent == lower.min_percent {
                return Err(CoreError::InvalidPolicy(format!(
                    "boundaries {:?} and {:?} overlap at {}",
                    upper.letter, lower.letter, upper.min_percent
                )));
            }
            if upper.grade_point < lower.grade_point {
                return Err(CoreError::InvalidPolicy(format!(
                    "boundary {:?} has a lower grade point than {:?} below it",
                    upper.letter, lower.letter
                )));
            }
        }

        let lowest = boundaries.last().map(|b| b.min_percent).unwrap_or(0.0);
        if lowest != 0.0 {
            return Err(CoreError::InvalidPolicy(format!(
                "no boundary starts at 0; percentages below {} would be ungraded",
                lowest
            )));
        }

        Ok(Self { boundaries })
    }

    pub fn boundaries(&self) -> &[GradeBoundary] {
        &self.boundaries
    }

    /// Highest boundary whose minimum is <= `percentage` (closed at the bottom).
    pub fn grade_for(&self, percentage: f64) -> Result<Grade, CoreError> {
        if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
            return Err(CoreError::InvalidPercentage(percentage));
        }
        self.boundaries
            .iter()
            .find(|b| percentage >= b.min_percent)
            .map(|b| Grade {
                letter: b.letter.clone(),
                grade_point: b.grade_point,
            })
            .ok_or(CoreError::InvalidPercentage(percentage))
    }
}

pub const PRESET_NAMES: &[&str] = &["letter7"];

/// Named tables a caller can opt into. Never applied implicitly.
pub fn preset(name: &str) -> Option<Vec<GradeBoundary>> {
    match name {
        "letter7" => Some(vec![
            GradeBoundary::new(90.0, "A+", 10.0),
            GradeBoundary::new(80.0, "A", 9.0),
            GradeBoundary::new(70.0, "B+", 8.0),
            GradeBoundary::new(60.0, "B", 7.0),
            GradeBoundary::new(50.0, "C", 6.0),
            GradeBoundary::new(40.0, "D", 5.0),
            GradeBoundary::new(0.0, "F", 0.0),
        ]),
        _ => None,
    }
}
