use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Instant;

use whatsapp::{BulkContact, MessageStatus, SessionStatus, WhatsAppSession};

use crate::services::{TenantWhatsApp, DEFAULT_TENANT};
use crate::utils::logging::*;
use crate::utils::{AppError, AppResult};
use crate::AppState;

pub const TENANT_HEADER: &str = "x-tenant-id";

const DEFAULT_MESSAGES_LIMIT: usize = 50;
const MAX_MESSAGES_LIMIT: usize = 200;

/// Tenant da requisição (`X-Tenant-Id`, ou `default`)
pub fn tenant_id(headers: &HeaderMap) -> AppResult<String> {
    let raw = headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let Some(raw) = raw else {
        return Ok(DEFAULT_TENANT.to_string());
    };

    let valid = raw.len() <= 64
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        log_validation_error("X-Tenant-Id", raw);
        return Err(AppError::ValidationError(
            "X-Tenant-Id deve ter até 64 caracteres [A-Za-z0-9._-]".to_string(),
        ));
    }
    Ok(raw.to_string())
}

async fn tenant(state: &AppState, headers: &HeaderMap) -> AppResult<(String, TenantWhatsApp)> {
    let id = tenant_id(headers)?;
    let tenant = state.whatsapp.tenant(&id).await?;
    Ok((id, tenant))
}

fn session_body(tenant: &str, session: &WhatsAppSession) -> Value {
    json!({
        "success": true,
        "tenant": tenant,
        "session": session,
        "connected": session.status == SessionStatus::Connected,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })
}

/// Inicia (ou retoma) a conexão e devolve o QR para pareamento
pub async fn connect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    log_request_received("/api/whatsapp/connect", "POST");
    let (id, tenant) = tenant(&state, &headers).await?;

    let session = tenant.sessions.connect().await?;
    if session.status == SessionStatus::Connecting {
        tenant
            .sessions
            .start_status_polling(state.whatsapp.poll_interval())
            .await;
    }

    log_whatsapp_event(&id, &format!("connect -> {}", session.status));
    Ok(Json(session_body(&id, &session)))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub refresh: bool,
}

/// Estado atual; `?refresh=true` consulta o fornecedor antes de responder
pub async fn status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> AppResult<Json<Value>> {
    let (id, tenant) = tenant(&state, &headers).await?;

    let current = tenant.sessions.session().await;
    let session = if query.refresh && current.session_id.is_some() {
        tenant.sessions.poll_status().await?
    } else {
        current
    };

    Ok(Json(session_body(&id, &session)))
}

pub async fn refresh_qr(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    log_request_received("/api/whatsapp/qr/refresh", "POST");
    let (id, tenant) = tenant(&state, &headers).await?;

    let session = tenant.sessions.refresh_qr().await?;
    log_whatsapp_event(&id, "QR renovado manualmente");
    Ok(Json(session_body(&id, &session)))
}

pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    log_request_received("/api/whatsapp/disconnect", "POST");
    let (id, tenant) = tenant(&state, &headers).await?;

    let session = tenant.sessions.disconnect().await?;
    log_whatsapp_event(&id, "sessão encerrada");
    Ok(Json(session_body(&id, &session)))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub phone: String,
    pub message: String,
}

/// Envio único. Falha de entrega volta como `success: false` com o registro.
pub async fn send(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SendRequest>,
) -> AppResult<Json<Value>> {
    log_request_received("/api/whatsapp/send", "POST");

    if request.message.trim().is_empty() {
        log_validation_error("message", "vazia");
        return Err(AppError::ValidationError("message é obrigatória".to_string()));
    }

    let (_, tenant) = tenant(&state, &headers).await?;
    let record = tenant
        .dispatcher
        .send_one(&request.phone, &request.message)
        .await?;

    Ok(Json(json!({
        "success": record.status == MessageStatus::Sent,
        "message": record
    })))
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub contacts: Vec<BulkContact>,
}

/// Disparo em massa sequencial; responde ao final com o relatório completo
pub async fn bulk(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<BulkRequest>,
) -> AppResult<Json<Value>> {
    let start_time = Instant::now();
    log_request_received("/api/whatsapp/bulk", "POST");

    if request.contacts.is_empty() {
        log_validation_error("contacts", "lista vazia");
        return Err(AppError::ValidationError("contacts não pode ser vazio".to_string()));
    }
    let max = state.whatsapp.bulk_max_contacts();
    if request.contacts.len() > max {
        log_validation_error("contacts", "acima do limite");
        return Err(AppError::ValidationError(format!(
            "máximo de {} contatos por disparo",
            max
        )));
    }
    if let Some(index) = request
        .contacts
        .iter()
        .position(|c| c.message.trim().is_empty())
    {
        return Err(AppError::ValidationError(format!(
            "contacts[{}].message é obrigatória",
            index
        )));
    }

    let (id, tenant) = tenant(&state, &headers).await?;
    let report = tenant.dispatcher.send_bulk(&request.contacts).await?;

    log_whatsapp_event(
        &id,
        &format!("disparo {}/{} enviados", report.success_count, report.total),
    );
    log_request_processed(
        "/api/whatsapp/bulk",
        200,
        start_time.elapsed().as_millis() as u64,
    );

    Ok(Json(json!({
        "success": true,
        "report": report
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<usize>,
}

/// Histórico recente do tenant, mais recentes primeiro
pub async fn messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MessagesQuery>,
) -> AppResult<Json<Value>> {
    let (id, tenant) = tenant(&state, &headers).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MESSAGES_LIMIT)
        .clamp(1, MAX_MESSAGES_LIMIT);

    let messages = tenant.history().recent(limit).await;
    Ok(Json(json!({
        "success": true,
        "tenant": id,
        "count": messages.len(),
        "messages": messages
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_tenant_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(tenant_id(&headers).unwrap(), "default");

        headers.insert(TENANT_HEADER, HeaderValue::from_static("revenda-01"));
        assert_eq!(tenant_id(&headers).unwrap(), "revenda-01");

        headers.insert(TENANT_HEADER, HeaderValue::from_static("../etc/passwd"));
        assert!(matches!(tenant_id(&headers), Err(AppError::ValidationError(_))));
    }
}
