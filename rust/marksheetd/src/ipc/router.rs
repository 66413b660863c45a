use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use tracing::{debug, warn};

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    debug!(id = %req.id, method = %req.method, "request");
    let handlers: [fn(&mut AppState, &Request) -> Option<serde_json::Value>; 6] = [
        handlers::core::try_handle,
        handlers::config::try_handle,
        handlers::grading::try_handle,
        handlers::results::try_handle,
        handlers::marksheet::try_handle,
        handlers::exchange::try_handle,
    ];
    for handle in handlers {
        if let Some(resp) = handle(state, &req) {
            return resp;
        }
    }

    warn!(method = %req.method, "unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
