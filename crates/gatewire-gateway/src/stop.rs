//! Graceful-shutdown stop sequence — cancels every in-flight agent turn and
//! drains every session's queue before the process exits.

use tracing::info;

use crate::app::AppState;

/// Cancel every active turn and return a human-readable report. Called from
/// `main`'s ctrl-c handler, not exposed as an RPC method.
pub async fn execute_stop(app: &AppState) -> String {
    let cancelled = app.orchestrator.abort_all();
    let report = if cancelled == 0 {
        "shutdown: no active turns to cancel".to_string()
    } else {
        format!("shutdown: cancelled {cancelled} in-flight turn(s)")
    };
    info!(cancelled, "graceful shutdown stop sequence complete");
    report
}
