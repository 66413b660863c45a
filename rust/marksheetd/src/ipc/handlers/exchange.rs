use crate::exchange::{export_batch, import_batch, staged_entries, ImportOutcome, ImportSummary};
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    accepted_json, active_config, catalogs, existing_index, optional_str, records,
    rejection_json, update_allowed, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Catalogs, ScoreEntry};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

const PREVIEW_ROW_LIMIT: usize = 250;

/// CSV text comes either inline (`text`) or from a file (`inPath`).
fn read_csv_input(req: &Request) -> Result<(String, Option<String>), HandlerErr> {
    if let Some(text) = req.params.get("text").and_then(|v| v.as_str()) {
        return Ok((text.to_string(), None));
    }
    let Some(in_path) = optional_str(req, "inPath")? else {
        return Err(HandlerErr::bad_params("missing params.text or params.inPath"));
    };
    match std::fs::read_to_string(in_path) {
        Ok(text) => Ok((text, Some(in_path.to_string()))),
        Err(e) => Err(HandlerErr {
            code: "io_failed",
            message: e.to_string(),
            details: Some(json!({ "path": in_path })),
        }),
    }
}

fn outcome_json(o: &ImportOutcome) -> serde_json::Value {
    let mut v = match &o.result {
        Ok(accepted) => accepted_json(accepted),
        Err(rejection) => rejection_json(rejection),
    };
    v["row"] = json!(o.row);
    v["line"] = json!(o.line);
    v
}

fn run_import(
    state: &AppState,
    req: &Request,
) -> Result<(Vec<ImportOutcome>, Option<String>), HandlerErr> {
    let config = active_config(state, req)?;
    let (text, in_path) = read_csv_input(req)?;
    let (students, subjects) = catalogs(req)?;
    let existing = existing_index(req)?;
    let update_allowed = update_allowed(req, &config)?;
    let cats = Catalogs {
        students: &students,
        subjects: &subjects,
    };
    let outcomes = import_batch(&text, cats, &existing, config.score_rules(), update_allowed)?;
    Ok((outcomes, in_path))
}

fn preview(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (outcomes, in_path) = run_import(state, req)?;
    let summary = ImportSummary::of(&outcomes);
    let preview_rows: Vec<serde_json::Value> = outcomes
        .iter()
        .take(PREVIEW_ROW_LIMIT)
        .map(outcome_json)
        .collect();
    Ok(json!({
        "path": in_path,
        "summary": summary,
        "previewRows": preview_rows,
        "previewTruncated": outcomes.len() > PREVIEW_ROW_LIMIT
    }))
}

fn import(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (outcomes, in_path) = run_import(state, req)?;
    let summary = ImportSummary::of(&outcomes);
    let staged = staged_entries(&outcomes);
    let batch_id = Uuid::new_v4().to_string();
    if summary.rejected > 0 {
        warn!(
            batch_id = %batch_id,
            rejected = summary.rejected,
            rows = summary.rows_total,
            "import batch has rejected rows"
        );
    }
    info!(
        batch_id = %batch_id,
        inserted = summary.inserted,
        updated = summary.updated,
        "import batch staged"
    );
    let outcomes_json: Vec<serde_json::Value> = outcomes.iter().map(outcome_json).collect();
    Ok(json!({
        "batchId": batch_id,
        "path": in_path,
        "summary": summary,
        "outcomes": outcomes_json,
        "staged": staged
    }))
}

fn export(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let config = active_config(state, req)?;
    let entries: Vec<ScoreEntry> = records(req, "entries")?;
    let (students, subjects) = catalogs(req)?;
    let class_id = optional_str(req, "classId")?;
    let out_path = optional_str(req, "outPath")?.map(PathBuf::from);
    let cats = Catalogs {
        students: &students,
        subjects: &subjects,
    };
    let batch = export_batch(&entries, cats, config.decimal_precision, class_id);
    if batch.skipped > 0 {
        warn!(skipped = batch.skipped, "export skipped entries with unknown references");
    }

    let Some(out) = out_path else {
        return Ok(json!({
            "text": batch.text,
            "rowsExported": batch.rows,
            "skipped": batch.skipped
        }));
    };
    if let Err(e) = std::fs::write(&out, &batch.text) {
        return Err(HandlerErr {
            code: "io_failed",
            message: e.to_string(),
            details: Some(json!({ "path": out.to_string_lossy() })),
        });
    }
    Ok(json!({
        "path": out.to_string_lossy(),
        "rowsExported": batch.rows,
        "skipped": batch.skipped
    }))
}

fn handle_exchange_preview_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    match preview(state, req) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_exchange_import_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    match import(state, req) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_exchange_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    match export(state, req) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exchange.previewCsv" => Some(handle_exchange_preview_csv(state, req)),
        "exchange.importCsv" => Some(handle_exchange_import_csv(state, req)),
        "exchange.exportCsv" => Some(handle_exchange_export_csv(state, req)),
        _ => None,
    }
}
