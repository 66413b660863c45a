use crate::ipc::error::ok;
use crate::ipc::helpers::{
    accepted_json, active_config, catalogs, existing_index, rejection_json, update_allowed,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Catalogs, ScoreEntry};
use crate::validate::validate;
use tracing::debug;

fn validate_one(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let config = active_config(state, req)?;
    let Some(raw_entry) = req.params.get("entry") else {
        return Err(HandlerErr::bad_params("missing params.entry"));
    };
    let entry: ScoreEntry = serde_json::from_value(raw_entry.clone())
        .map_err(|e| HandlerErr::bad_params(format!("params.entry: {}", e)))?;
    let (students, subjects) = catalogs(req)?;
    let existing = existing_index(req)?;
    let update_allowed = update_allowed(req, &config)?;

    let cats = Catalogs {
        students: &students,
        subjects: &subjects,
    };
    let outcome = validate(&entry, cats, &existing, config.score_rules(), update_allowed);
    Ok(match &outcome {
        Ok(accepted) => accepted_json(accepted),
        Err(rejection) => {
            debug!(code = rejection.kind.code(), "entry rejected");
            rejection_json(rejection)
        }
    })
}

fn handle_results_validate(state: &mut AppState, req: &Request) -> serde_json::Value {
    match validate_one(state, req) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.validate" => Some(handle_results_validate(state, req)),
        _ => None,
    }
}
