use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::infra::app_state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let last_merge = state.coordinator.last_report().map(|report| {
        json!({
            "pass_id": report.pass_id,
            "trigger": report.trigger,
            "finished_at": report.finished_at.to_rfc3339(),
        })
    });

    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "merge": {
                "running": state.coordinator.is_running(),
                "aggregate_items": state.aggregate().len(),
                "last_merge": last_merge,
            }
        }
    }))
}
