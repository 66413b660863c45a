use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Stable error kinds shared by the grading core and the IPC surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPercentage,
    InvalidPolicy,
    InvalidCatalog,
    InvalidConfig,
    UnknownReference,
    OutOfRange,
    MalformedScore,
    DuplicateEntry,
    DuplicateInBatch,
    MalformedRow,
    IncompleteResult,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidPercentage => "invalid_percentage",
            ErrorKind::InvalidPolicy => "invalid_policy",
            ErrorKind::InvalidCatalog => "invalid_catalog",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::UnknownReference => "unknown_reference",
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::MalformedScore => "malformed_score",
            ErrorKind::DuplicateEntry => "duplicate_entry",
            ErrorKind::DuplicateInBatch => "duplicate_in_batch",
            ErrorKind::MalformedRow => "malformed_row",
            ErrorKind::IncompleteResult => "incomplete_result",
        }
    }
}

/// Failures raised by a computation or by building a policy/catalog.
///
/// Per-entry and per-row problems are never raised through this type; they come
/// back as [`Rejection`] values so a batch always runs to completion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("percentage {0} is outside [0, 100]")]
    InvalidPercentage(f64),

    #[error("invalid grading policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("unknown reference: {0}")]
    UnknownReference(String),

    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("malformed row: {0}")]
    MalformedRow(String),

    /// A stored entry that fails the same range/format checks as new input.
    #[error("invalid entry: {}", .0.message)]
    InvalidEntry(Rejection),

    #[error(
        "results pending for student {student_id} in exam {exam_id}: {} subject(s) without a score",
        missing_subjects.len()
    )]
    IncompleteResult {
        student_id: String,
        exam_id: String,
        missing_subjects: Vec<String>,
    },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidPercentage(_) => ErrorKind::InvalidPercentage,
            CoreError::InvalidPolicy(_) => ErrorKind::InvalidPolicy,
            CoreError::InvalidCatalog(_) => ErrorKind::InvalidCatalog,
            CoreError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            CoreError::UnknownReference(_) => ErrorKind::UnknownReference,
            CoreError::DuplicateEntry(_) => ErrorKind::DuplicateEntry,
            CoreError::MalformedRow(_) => ErrorKind::MalformedRow,
            CoreError::InvalidEntry(r) => r.kind,
            CoreError::IncompleteResult { .. } => ErrorKind::IncompleteResult,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            CoreError::InvalidPercentage(p) if p.is_finite() => Some(json!({ "percentage": p })),
            // Raised only for the header, before any data row.
            CoreError::MalformedRow(_) => Some(json!({ "row": 0 })),
            CoreError::InvalidEntry(r) => r.details.clone(),
            CoreError::IncompleteResult {
                student_id,
                exam_id,
                missing_subjects,
            } => Some(json!({
                "studentId": student_id,
                "examId": exam_id,
                "missingSubjects": missing_subjects,
            })),
            _ => None,
        }
    }
}

/// Why a single entry or CSV row was not accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    #[serde(rename = "code")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl Rejection {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_result_is_its_own_code() {
        let e = CoreError::IncompleteResult {
            student_id: "s1".into(),
            exam_id: "mid".into(),
            missing_subjects: vec!["eng".into()],
        };
        assert_eq!(e.code(), "incomplete_result");
        assert_ne!(e.code(), CoreError::MalformedRow("x".into()).code());
        let details = e.details().expect("details");
        assert_eq!(details["missingSubjects"], json!(["eng"]));
    }

    #[test]
    fn rejection_serializes_kind_as_code() {
        let r = Rejection::new(ErrorKind::OutOfRange, "too high");
        let v = serde_json::to_value(&r).expect("serialize");
        assert_eq!(v["code"], "out_of_range");
        assert!(v.get("details").is_none());
    }
}
