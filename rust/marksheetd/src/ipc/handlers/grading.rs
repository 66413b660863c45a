use crate::grading::{preset, PRESET_NAMES};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{active_config, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_grading_grade(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(percentage) = req.params.get("percentage").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "params.percentage must be a number", None);
    };
    let config = match active_config(state, req) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match config.policy.grade_for(percentage) {
        Ok(grade) => ok(&req.id, json!(grade)),
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

fn handle_grading_presets(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let presets: Vec<serde_json::Value> = PRESET_NAMES
        .iter()
        .filter_map(|name| {
            preset(name).map(|boundaries| json!({ "name": name, "gradeBoundaries": boundaries }))
        })
        .collect();
    ok(&req.id, json!({ "presets": presets }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grading.grade" => Some(handle_grading_grade(state, req)),
        "grading.presets" => Some(handle_grading_presets(state, req)),
        _ => None,
    }
}
