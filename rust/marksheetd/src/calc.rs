use crate::config::{EngineConfig, GpaMode};
use crate::error::CoreError;
use crate::grading::Grade;
use crate::model::{ScoreEntry, Student, StudentCatalog, Subject, SubjectCatalog};
use crate::validate::check_marks;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Digits kept on percentages and GPA. Grades are read from the rounded
/// percentage, so this must not follow the marks format (`decimalPrecision`).
pub const PERCENT_PLACES: u32 = 2;

/// Half-up rounding to `places` digits: `Int(10^p * x + 0.5) / 10^p`.
/// Inputs here are never negative.
pub fn round_off(x: f64, places: u32) -> f64 {
    let scale = 10_f64.powi(places as i32);
    ((scale * x) + 0.5).floor() / scale
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectLine {
    pub subject_id: String,
    pub subject_name: String,
    pub obtained_marks: f64,
    pub max_marks: u32,
    pub percentage: f64,
    pub letter: String,
    pub grade_point: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Marksheet {
    pub student_id: String,
    pub student_name: String,
    pub class_id: String,
    pub exam_id: String,
    pub subjects: Vec<SubjectLine>,
    pub total_obtained: f64,
    pub total_maximum: u64,
    pub percentage: f64,
    pub overall_grade: Grade,
    pub gpa: f64,
    pub gpa_mode: GpaMode,
    pub complete: bool,
    pub missing_subjects: Vec<String>,
}

/// Builds the marksheet for one student and exam from the current entries.
///
/// Subject order follows the subject catalog; entry order never matters, so
/// identical inputs always give an identical marksheet. Entries for other
/// students, other exams, or subjects outside the student's class are ignored.
pub fn build_marksheet(
    student: &Student,
    exam_id: &str,
    entries: &[ScoreEntry],
    subjects: &SubjectCatalog,
    config: &EngineConfig,
) -> Result<Marksheet, CoreError> {
    let expected: Vec<&Subject> = subjects.for_class(&student.class_id).collect();

    let mut by_subject: BTreeMap<&str, &ScoreEntry> = BTreeMap::new();
    for e in entries {
        if e.student_id != student.id || e.exam_id != exam_id {
            continue;
        }
        if !expected.iter().any(|s| s.id == e.subject_id) {
            debug!(
                student_id = %student.id,
                subject_id = %e.subject_id,
                "ignoring entry for a subject outside the student's class"
            );
            continue;
        }
        if by_subject.insert(e.subject_id.as_str(), e).is_some() {
            return Err(CoreError::DuplicateEntry(format!(
                "more than one entry for student {} subject {} exam {}",
                student.id, e.subject_id, exam_id
            )));
        }
    }

    let missing_subjects: Vec<String> = expected
        .iter()
        .filter(|s| !by_subject.contains_key(s.id.as_str()))
        .map(|s| s.id.clone())
        .collect();
    if by_subject.is_empty() || (!missing_subjects.is_empty() && !config.allow_partial) {
        return Err(CoreError::IncompleteResult {
            student_id: student.id.clone(),
            exam_id: exam_id.to_string(),
            missing_subjects,
        });
    }

    let mut lines: Vec<SubjectLine> = Vec::with_capacity(by_subject.len());
    let mut total_obtained = 0.0_f64;
    let mut total_maximum = 0_u64;
    for subject in &expected {
        let Some(entry) = by_subject.get(subject.id.as_str()) else {
            continue;
        };
        check_marks(entry.obtained_marks, subject, config.score_rules()).map_err(|mut r| {
            if let Some(details) = r.details.as_mut() {
                details["subjectId"] = json!(subject.id);
            }
            CoreError::InvalidEntry(r)
        })?;
        let percentage = round_off(
            100.0 * entry.obtained_marks / f64::from(subject.max_marks),
            PERCENT_PLACES,
        );
        let grade = config.policy.grade_for(percentage)?;
        total_obtained += entry.obtained_marks;
        total_maximum += u64::from(subject.max_marks);
        lines.push(SubjectLine {
            subject_id: subject.id.clone(),
            subject_name: subject.name.clone(),
            obtained_marks: entry.obtained_marks,
            max_marks: subject.max_marks,
            percentage,
            letter: grade.letter,
            grade_point: grade.grade_point,
            credit: subject.credit,
        });
    }

    let percentage = round_off(
        100.0 * total_obtained / (total_maximum as f64),
        PERCENT_PLACES,
    );
    let total_obtained = round_off(total_obtained, config.decimal_precision);
    let overall_grade = config.policy.grade_for(percentage)?;
    let gpa = round_off(grade_point_average(&lines, config.gpa_mode)?, PERCENT_PLACES);

    Ok(Marksheet {
        student_id: student.id.clone(),
        student_name: student.name.clone(),
        class_id: student.class_id.clone(),
        exam_id: exam_id.to_string(),
        subjects: lines,
        total_obtained,
        total_maximum,
        percentage,
        overall_grade,
        gpa,
        gpa_mode: config.gpa_mode,
        complete: missing_subjects.is_empty(),
        missing_subjects,
    })
}

fn grade_point_average(lines: &[SubjectLine], mode: GpaMode) -> Result<f64, CoreError> {
    match mode {
        GpaMode::Simple => {
            let sum: f64 = lines.iter().map(|l| l.grade_point).sum();
            Ok(sum / (lines.len() as f64))
        }
        GpaMode::CreditWeighted => {
            let mut weighted = 0.0_f64;
            let mut credits = 0.0_f64;
            for l in lines {
                let Some(credit) = l.credit else {
                    return Err(CoreError::InvalidPolicy(format!(
                        "subject {} has no credit weight; credit_weighted GPA needs one",
                        l.subject_id
                    )));
                };
                weighted += l.grade_point * credit;
                credits += credit;
            }
            Ok(weighted / credits)
        }
    }
}

/// One row of a class result sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassResult {
    pub student_id: String,
    pub result: Result<Marksheet, CoreError>,
}

/// Marksheets for every student of a class, in student-id order. A student
/// whose results are pending (or broken) does not stop the others.
pub fn build_class_marksheets(
    class_id: &str,
    exam_id: &str,
    entries: &[ScoreEntry],
    students: &StudentCatalog,
    subjects: &SubjectCatalog,
    config: &EngineConfig,
) -> Vec<ClassResult> {
    students
        .in_class(class_id)
        .map(|s| ClassResult {
            student_id: s.id.clone(),
            result: build_marksheet(s, exam_id, entries, subjects, config),
        })
        .collect()
}
