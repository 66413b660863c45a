use crate::config::EngineConfig;
use crate::error::{CoreError, Rejection};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::model::{EntryIndex, ScoreEntry, Student, StudentCatalog, Subject, SubjectCatalog};
use crate::validate::{Accepted, EntryAction};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::borrow::Cow;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<CoreError> for HandlerErr {
    fn from(e: CoreError) -> Self {
        Self {
            code: e.code(),
            details: e.details(),
            message: e.to_string(),
        }
    }
}

pub fn required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, HandlerErr> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{}", key)))
}

pub fn optional_str<'a>(req: &'a Request, key: &str) -> Result<Option<&'a str>, HandlerErr> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.trim()).filter(|t| !t.is_empty()))
            .ok_or_else(|| HandlerErr::bad_params(format!("params.{} must be a string", key))),
    }
}

/// Deserializes `params.<key>` as an array of records.
pub fn records<T: DeserializeOwned>(req: &Request, key: &str) -> Result<Vec<T>, HandlerErr> {
    let Some(raw) = req.params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing params.{}", key)));
    };
    if !raw.is_array() {
        return Err(HandlerErr::bad_params(format!("params.{} must be an array", key)));
    }
    serde_json::from_value(raw.clone()).map_err(|e| HandlerErr {
        code: "bad_params",
        message: format!("params.{}: {}", key, e),
        details: Some(json!({ "field": key })),
    })
}

/// Like [`records`], but an absent or null key means "none".
pub fn optional_records<T: DeserializeOwned>(
    req: &Request,
    key: &str,
) -> Result<Vec<T>, HandlerErr> {
    match req.params.get(key) {
        None => Ok(Vec::new()),
        Some(v) if v.is_null() => Ok(Vec::new()),
        Some(_) => records(req, key),
    }
}

pub fn catalogs(req: &Request) -> Result<(StudentCatalog, SubjectCatalog), HandlerErr> {
    let students = StudentCatalog::new(records::<Student>(req, "students")?)?;
    let subjects = SubjectCatalog::new(records::<Subject>(req, "subjects")?)?;
    Ok((students, subjects))
}

pub fn existing_index(req: &Request) -> Result<EntryIndex, HandlerErr> {
    let existing: Vec<ScoreEntry> = optional_records(req, "existing")?;
    Ok(EntryIndex::from_entries(&existing))
}

/// The config for this call: inline `params.config` wins over the active one.
pub fn active_config<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<Cow<'a, EngineConfig>, HandlerErr> {
    if let Some(raw) = req.params.get("config").filter(|v| !v.is_null()) {
        return Ok(Cow::Owned(EngineConfig::from_json(raw)?));
    }
    state.config.as_ref().map(Cow::Borrowed).ok_or_else(|| HandlerErr {
        code: "no_config",
        message: "set a config first (config.set / config.load) or pass params.config".to_string(),
        details: None,
    })
}

pub fn update_allowed(req: &Request, config: &EngineConfig) -> Result<bool, HandlerErr> {
    match req.params.get("updateAllowed") {
        None => Ok(config.update_allowed),
        Some(v) if v.is_null() => Ok(config.update_allowed),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| HandlerErr::bad_params("params.updateAllowed must be a boolean")),
    }
}

pub fn accepted_json(a: &Accepted) -> serde_json::Value {
    let mut v = json!({
        "status": "accepted",
        "action": a.action.as_str(),
        "entry": a.entry,
    });
    if let EntryAction::Update { previous_marks } = a.action {
        v["previousMarks"] = json!(previous_marks);
    }
    v
}

pub fn rejection_json(r: &Rejection) -> serde_json::Value {
    let mut v = json!({
        "status": "rejected",
        "code": r.kind.code(),
        "message": r.message,
    });
    if let Some(d) = &r.details {
        v["details"] = d.clone();
    }
    v
}
