use crate::config::EngineConfig;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::HandlerErr;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn config_json(config: &EngineConfig) -> serde_json::Value {
    json!(config.to_document())
}

fn handle_config_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("config").filter(|v| !v.is_null()) else {
        return err(&req.id, "bad_params", "missing params.config", None);
    };
    match EngineConfig::from_json(raw) {
        Ok(config) => {
            info!(
                boundaries = config.policy.boundaries().len(),
                gpa_mode = ?config.gpa_mode,
                "config set"
            );
            let result = json!({ "config": config_json(&config) });
            state.config = Some(config);
            ok(&req.id, result)
        }
        // The previous config, if any, stays active.
        Err(e) => HandlerErr::from(e).response(&req.id),
    }
}

fn handle_config_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
    else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match EngineConfig::load(&path) {
        Ok(config) => {
            info!(path = %path.display(), "config loaded");
            let result = json!({
                "path": path.to_string_lossy(),
                "config": config_json(&config)
            });
            state.config = Some(config);
            ok(&req.id, result)
        }
        Err(e) => match e.downcast::<crate::error::CoreError>() {
            Ok(core) => HandlerErr::from(core).response(&req.id),
            Err(other) => err(
                &req.id,
                "io_failed",
                format!("{other:#}"),
                Some(json!({ "path": path.to_string_lossy() })),
            ),
        },
    }
}

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.config.as_ref() {
        Some(config) => ok(&req.id, json!({ "config": config_json(config) })),
        None => err(&req.id, "no_config", "no config has been set", None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "config.set" => Some(handle_config_set(state, req)),
        "config.load" => Some(handle_config_load(state, req)),
        "config.get" => Some(handle_config_get(state, req)),
        _ => None,
    }
}
