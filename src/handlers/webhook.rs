/// Webhook de recibos do fornecedor WhatsApp
///
/// Aceita os dois formatos suportados:
/// - Evolution API: `{"event": "messages.update", "data": {"keyId"|"key": {"id"}, "status"}}`
///   (`data` pode vir como lista)
/// - Z-API: `{"type": "MessageStatusCallback", "ids": [...], "status": "READ"}`
///
/// Outros eventos são confirmados com 200 e ignorados.

use axum::{extract::State, response::Json};
use serde_json::{json, Value};
use std::sync::Arc;

use whatsapp::MessageStatus;

use crate::utils::logging::*;
use crate::utils::AppResult;
use crate::AppState;

/// Recibo extraído do payload
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub message_id: String,
    pub status: MessageStatus,
}

fn map_status(raw: &str) -> Option<MessageStatus> {
    match raw.to_ascii_uppercase().as_str() {
        "SERVER_ACK" | "SENT" => Some(MessageStatus::Sent),
        "DELIVERY_ACK" | "RECEIVED" | "DELIVERED" => Some(MessageStatus::Delivered),
        "READ" | "READ_BY_ME" | "PLAYED" => Some(MessageStatus::Read),
        "ERROR" | "FAILED" => Some(MessageStatus::Failed),
        _ => None,
    }
}

/// Extrai os recibos de um payload Evolution ou Z-API
pub fn parse_receipts(payload: &Value) -> Vec<Receipt> {
    let event = payload
        .get("event")
        .and_then(Value::as_str)
        .map(|e| e.to_ascii_lowercase().replace('_', "."));

    if event.as_deref() == Some("messages.update") {
        let items = match payload.get("data") {
            Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
            Some(item) => vec![item],
            None => Vec::new(),
        };

        return items
            .into_iter()
            .filter_map(|item| {
                let message_id = item
                    .get("keyId")
                    .or_else(|| item.pointer("/key/id"))
                    .and_then(Value::as_str)?;
                let status = item
                    .get("status")
                    .or_else(|| item.pointer("/update/status"))
                    .and_then(Value::as_str)
                    .and_then(map_status)?;
                Some(Receipt {
                    message_id: message_id.to_string(),
                    status,
                })
            })
            .collect();
    }

    if payload.get("type").and_then(Value::as_str) == Some("MessageStatusCallback") {
        let Some(status) = payload
            .get("status")
            .and_then(Value::as_str)
            .and_then(map_status)
        else {
            return Vec::new();
        };

        return payload
            .get("ids")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(|id| Receipt {
                        message_id: id.to_string(),
                        status,
                    })
                    .collect()
            })
            .unwrap_or_default();
    }

    Vec::new()
}

pub async fn handle_whatsapp_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> AppResult<Json<Value>> {
    log_request_received("/webhooks/whatsapp", "POST");

    let receipts = parse_receipts(&payload);
    let now = chrono::Utc::now();
    let mut updated = 0;

    for receipt in &receipts {
        match state
            .whatsapp
            .apply_receipt(&receipt.message_id, receipt.status, now)
            .await
        {
            Some(message) => {
                updated += 1;
                tracing::debug!(
                    "📬 Recibo {} aplicado: {} -> {:?}",
                    receipt.message_id,
                    message.phone,
                    message.status
                );
            }
            None => {
                tracing::debug!("📭 Recibo para mensagem desconhecida: {}", receipt.message_id);
            }
        }
    }

    if !receipts.is_empty() {
        log_info(&format!(
            "📬 Webhook WhatsApp: {} recibos, {} aplicados",
            receipts.len(),
            updated
        ));
    }

    Ok(Json(json!({
        "success": true,
        "receipts": receipts.len(),
        "updated": updated
    })))
}
