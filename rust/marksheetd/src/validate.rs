//! Acceptance checks for a single score entry.
//!
//! Interactive edits and CSV rows both pass through [`validate`], so the two
//! paths cannot disagree about what a legal entry is. Checks run in a fixed
//! order and the first failure wins.

use crate::config::ScoreRules;
use crate::error::{ErrorKind, Rejection};
use crate::model::{Catalogs, EntryIndex, ScoreEntry, Subject};
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryAction {
    Insert,
    Update { previous_marks: f64 },
}

impl EntryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryAction::Insert => "insert",
            EntryAction::Update { .. } => "update",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub entry: ScoreEntry,
    pub action: EntryAction,
}

pub fn validate(
    entry: &ScoreEntry,
    catalogs: Catalogs<'_>,
    existing: &EntryIndex,
    rules: ScoreRules,
    update_allowed: bool,
) -> Result<Accepted, Rejection> {
    // 1. referential
    let Some(student) = catalogs.students.get(&entry.student_id) else {
        return Err(Rejection::new(ErrorKind::UnknownReference, "unknown student id")
            .with_details(json!({ "studentId": entry.student_id })));
    };
    let Some(subject) = catalogs.subjects.get(&entry.subject_id) else {
        return Err(Rejection::new(ErrorKind::UnknownReference, "unknown subject id")
            .with_details(json!({ "subjectId": entry.subject_id })));
    };
    if subject.class_id != student.class_id {
        return Err(Rejection::new(
            ErrorKind::UnknownReference,
            "subject is not offered to the student's class",
        )
        .with_details(json!({
            "studentId": student.id,
            "subjectId": subject.id,
            "studentClassId": student.class_id,
            "subjectClassId": subject.class_id,
        })));
    }
    if entry.exam_id.trim().is_empty() {
        return Err(Rejection::new(ErrorKind::UnknownReference, "exam id must not be blank"));
    }

    // 2. range, 3. format
    check_marks(entry.obtained_marks, subject, rules)?;

    // 4. conflict
    let action = match existing.get(&entry.key()) {
        None => EntryAction::Insert,
        Some(previous_marks) if update_allowed => EntryAction::Update { previous_marks },
        Some(previous_marks) => {
            return Err(Rejection::new(
                ErrorKind::DuplicateEntry,
                "an entry already exists for this student, subject and exam",
            )
            .with_details(json!({ "previousMarks": previous_marks })));
        }
    };

    Ok(Accepted {
        entry: entry.clone(),
        action,
    })
}

/// Range then format checks for one marks value against its subject.
pub fn check_marks(marks: f64, subject: &Subject, rules: ScoreRules) -> Result<(), Rejection> {
    let max = f64::from(subject.max_marks);
    if marks.is_finite() && !(0.0..=max).contains(&marks) {
        return Err(Rejection::new(
            ErrorKind::OutOfRange,
            format!("obtained marks must be between 0 and {}", subject.max_marks),
        )
        .with_details(json!({
            "obtainedMarks": marks,
            "maxMarks": subject.max_marks,
        })));
    }

    if let Some(message) = malformed_reason(marks, rules) {
        let detail = if marks.is_finite() {
            json!({ "obtainedMarks": marks })
        } else {
            json!({ "obtainedMarks": marks.to_string() })
        };
        return Err(Rejection::new(ErrorKind::MalformedScore, message).with_details(detail));
    }
    Ok(())
}

fn malformed_reason(marks: f64, rules: ScoreRules) -> Option<String> {
    if !marks.is_finite() {
        return Some("obtained marks must be a finite number".to_string());
    }
    if !rules.allow_fractional && marks.fract() != 0.0 {
        return Some("fractional marks are not allowed".to_string());
    }
    if !fits_precision(marks, rules.decimal_precision) {
        return Some(format!(
            "obtained marks may have at most {} digit(s) after the decimal point",
            rules.decimal_precision
        ));
    }
    None
}

/// True when `value` has no significant digits beyond `places`.
pub fn fits_precision(value: f64, places: u32) -> bool {
    let scaled = value * 10_f64.powi(places as i32);
    (scaled - scaled.round()).abs() <= 1e-6 * scaled.abs().max(1.0)
}
