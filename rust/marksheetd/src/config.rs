use crate::error::CoreError;
use crate::grading::{GradeBoundary, GradingPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DECIMAL_PRECISION: u32 = 2;
pub const MAX_DECIMAL_PRECISION: u32 = 6;

fn default_decimal_precision() -> u32 {
    DEFAULT_DECIMAL_PRECISION
}

fn default_allow_fractional() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpaMode {
    Simple,
    CreditWeighted,
}

/// Configuration as it appears on the wire or on disk.
///
/// Grade boundaries, GPA mode, partial-marksheet and update policy have no
/// defaults; an institution must state them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigDocument {
    #[serde(alias = "grade_boundaries")]
    pub grade_boundaries: Vec<GradeBoundary>,
    #[serde(alias = "gpa_mode")]
    pub gpa_mode: GpaMode,
    #[serde(alias = "allow_partial")]
    pub allow_partial: bool,
    #[serde(alias = "update_allowed")]
    pub update_allowed: bool,
    #[serde(default = "default_decimal_precision", alias = "decimal_precision")]
    pub decimal_precision: u32,
    #[serde(default = "default_allow_fractional", alias = "allow_fractional")]
    pub allow_fractional: bool,
}

/// Rules a single score value must satisfy to be well-formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRules {
    pub decimal_precision: u32,
    pub allow_fractional: bool,
}

/// A fully validated configuration. Only constructible through
/// [`EngineConfig::from_document`], so holding one implies a usable policy.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub policy: GradingPolicy,
    pub gpa_mode: GpaMode,
    pub allow_partial: bool,
    pub update_allowed: bool,
    pub decimal_precision: u32,
    pub allow_fractional: bool,
}

impl EngineConfig {
    pub fn from_document(doc: ConfigDocument) -> Result<Self, CoreError> {
        if doc.decimal_precision > MAX_DECIMAL_PRECISION {
            return Err(CoreError::InvalidConfig(format!(
                "decimalPrecision must be between 0 and {}",
                MAX_DECIMAL_PRECISION
            )));
        }
        let policy = GradingPolicy::new(doc.grade_boundaries)?;
        Ok(Self {
            policy,
            gpa_mode: doc.gpa_mode,
            allow_partial: doc.allow_partial,
            update_allowed: doc.update_allowed,
            decimal_precision: doc.decimal_precision,
            allow_fractional: doc.allow_fractional,
        })
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        let doc: ConfigDocument = serde_json::from_value(value.clone())
            .map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        Self::from_document(doc)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let doc: ConfigDocument = serde_json::from_str(&text)
            .map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        Ok(Self::from_document(doc)?)
    }

    pub fn to_document(&self) -> ConfigDocument {
        ConfigDocument {
            grade_boundaries: self.policy.boundaries().to_vec(),
            gpa_mode: self.gpa_mode,
            allow_partial: self.allow_partial,
            update_allowed: self.update_allowed,
            decimal_precision: self.decimal_precision,
            allow_fractional: self.allow_fractional,
        }
    }

    pub fn score_rules(&self) -> ScoreRules {
        ScoreRules {
            decimal_precision: self.decimal_precision,
            allow_fractional: self.allow_fractional,
        }
    }
}
