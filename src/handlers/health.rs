use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::utils::logging::*;
use crate::AppState;

pub async fn health_check() -> Json<Value> {
    log_health_check();

    Json(json!({
        "status": "healthy",
        "service": "gestor-middleware",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn status_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    log_health_check();

    let uptime_secs = (chrono::Utc::now() - state.started_at).num_seconds();

    Json(json!({
        "service": "gestor-middleware",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_secs": uptime_secs,
        "environment": std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string()),
        "provedores": {
            "registered": state.registry.providers().len(),
        },
        "whatsapp": {
            "enabled": state.whatsapp.is_enabled(),
            "provider": state.whatsapp.provider_name(),
            "tenants": state.whatsapp.tenant_count().await,
        },
        "rate_limit": {
            "tracked_clients": state.rate_limiter.tracked_keys().await,
            "api": state.settings.rate_limit,
            "probe": state.settings.probe_rate_limit,
        }
    }))
}
