use crate::calc::{build_class_marksheets, build_marksheet};
use crate::error::CoreError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{active_config, catalogs, records, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::ScoreEntry;
use serde_json::json;
use tracing::{debug, info};

fn build_one(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let config = active_config(state, req)?;
    let student_id = required_str(req, "studentId")?;
    let exam_id = required_str(req, "examId")?;
    let (students, subjects) = catalogs(req)?;
    let entries: Vec<ScoreEntry> = records(req, "entries")?;

    let Some(student) = students.get(student_id) else {
        return Err(CoreError::UnknownReference(format!("unknown student id {}", student_id)).into());
    };
    let marksheet = build_marksheet(student, exam_id, &entries, &subjects, &config)?;
    debug!(
        student_id,
        exam_id,
        subjects = marksheet.subjects.len(),
        complete = marksheet.complete,
        "marksheet built"
    );
    Ok(json!({ "marksheet": marksheet }))
}

fn build_class(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let config = active_config(state, req)?;
    let class_id = required_str(req, "classId")?;
    let exam_id = required_str(req, "examId")?;
    let (students, subjects) = catalogs(req)?;
    let entries: Vec<ScoreEntry> = records(req, "entries")?;

    let rows = build_class_marksheets(class_id, exam_id, &entries, &students, &subjects, &config);
    let mut complete = 0usize;
    let mut pending = 0usize;
    let mut failed = 0usize;
    let results: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| match &row.result {
            Ok(marksheet) => {
                if marksheet.complete {
                    complete += 1;
                } else {
                    pending += 1;
                }
                json!({ "studentId": row.student_id, "ok": true, "marksheet": marksheet })
            }
            Err(e) => {
                if matches!(e, CoreError::IncompleteResult { .. }) {
                    pending += 1;
                } else {
                    failed += 1;
                }
                let mut error = json!({ "code": e.code(), "message": e.to_string() });
                if let Some(d) = e.details() {
                    error["details"] = d;
                }
                json!({ "studentId": row.student_id, "ok": false, "error": error })
            }
        })
        .collect();
    info!(class_id, exam_id, complete, pending, failed, "class marksheets built");

    Ok(json!({
        "classId": class_id,
        "examId": exam_id,
        "completeCount": complete,
        "pendingCount": pending,
        "failedCount": failed,
        "results": results
    }))
}

fn handle_marksheet_build(state: &mut AppState, req: &Request) -> serde_json::Value {
    match build_one(state, req) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_marksheet_build_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    match build_class(state, req) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marksheet.build" => Some(handle_marksheet_build(state, req)),
        "marksheet.buildClass" => Some(handle_marksheet_build_class(state, req)),
        _ => None,
    }
}
