use crate::config::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Catalogs and entries arrive with every request; the only thing the sidecar
/// remembers between requests is the active configuration.
#[derive(Debug, Default)]
pub struct AppState {
    pub config: Option<EngineConfig>,
}
