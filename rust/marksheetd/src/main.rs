mod calc;
mod config;
mod error;
mod exchange;
mod grading;
mod ipc;
mod model;
mod validate;

use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

/// Logs go to stderr; stdout carries one JSON response per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("MARKSHEETD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

/// One request per input line, one response per output line, until EOF.
fn serve(input: impl BufRead, mut out: impl Write, state: &mut ipc::AppState) {
    for line in input.lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(state, req),
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request line");
                ipc::bad_json(e.to_string())
            }
        };
        let _ = writeln!(out, "{}", resp);
        let _ = out.flush();
    }
}

fn main() {
    init_tracing();
    let mut state = ipc::AppState::default();
    serve(io::stdin().lock(), io::stdout(), &mut state);
    tracing::debug!("stdin closed, exiting");
}
