use axum::{extract::State, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Instant;

use provedores::Credentials;

use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

/// Lista de provedores para a tela de cadastro (rótulos e placeholders)
pub async fn list_provedores(State(state): State<Arc<AppState>>) -> Json<Value> {
    log_request_received("/api/provedores", "GET");

    let provedores: Vec<Value> = state
        .registry
        .providers()
        .into_iter()
        .map(|provider| {
            let mut entry = json!(provider);
            entry["custom_strategy"] = json!(state.registry.has_custom_strategy(&provider.id));
            entry["steps"] = json!(state
                .registry
                .strategy_for(&provider.id)
                .steps
                .iter()
                .map(|step| json!({ "type": step.kind, "label": step.label }))
                .collect::<Vec<_>>());
            entry
        })
        .collect();

    Json(json!({
        "success": true,
        "count": provedores.len(),
        "provedores": provedores
    }))
}

#[derive(Debug, Deserialize)]
pub struct TestarRequest {
    #[serde(default)]
    pub provider_id: Option<String>,
    pub base_url: String,
    pub username: String,
    pub password: String,
}

/// Testa credenciais de revenda contra o painel do fornecedor
pub async fn testar_provedor(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TestarRequest>,
) -> AppResult<Json<Value>> {
    let start_time = Instant::now();
    log_request_received("/api/provedores/testar", "POST");

    if request.base_url.trim().is_empty() {
        log_validation_error("base_url", "vazio");
        return Err(AppError::ValidationError("base_url é obrigatório".to_string()));
    }
    if request.username.trim().is_empty() || request.password.is_empty() {
        log_validation_error("credentials", "usuário ou senha vazios");
        return Err(AppError::ValidationError(
            "username e password são obrigatórios".to_string(),
        ));
    }

    let provider_id = request
        .provider_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or("generico")
        .to_string();

    if state.registry.provider(&provider_id).is_none() {
        log_warning(&format!(
            "⚠️ Provedor '{}' desconhecido, usando estratégia universal",
            provider_id
        ));
    }

    let credentials = Credentials::new(request.username.trim(), request.password);
    let report = state
        .prober
        .probe_provider(&state.registry, &provider_id, &request.base_url, &credentials)
        .await?;

    log_probe_finished(&provider_id, &report.base_url, report.success, report.attempts.len());
    log_request_processed(
        "/api/provedores/testar",
        200,
        start_time.elapsed().as_millis() as u64,
    );

    let mut body = json!(report);
    body["provider_id"] = json!(provider_id);
    Ok(Json(body))
}
