//! Modelos de sessão, mensagem e disparo em massa

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WhatsAppError};

/// Estado da sessão WhatsApp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sessão WhatsApp vista pela UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppSession {
    pub session_id: Option<String>,
    pub status: SessionStatus,
    /// QR em base64 (data URL) ou texto cru, conforme o fornecedor
    pub qr_code: Option<String>,
    pub qr_expires_at: Option<DateTime<Utc>>,
    pub phone_number: Option<String>,
    pub profile_name: Option<String>,
    /// Último erro do fornecedor (preenchido quando `failed`)
    pub error: Option<String>,
}

/// Snapshot persistido para reidratar a sessão após reload/restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub qr_code: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
    pub disconnected_at: Option<DateTime<Utc>>,
}

/// Status de entrega de uma mensagem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Ordem de progresso dos recibos; `Failed` não participa
    fn rank(&self) -> u8 {
        match self {
            MessageStatus::Pending => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Read => 3,
            MessageStatus::Failed => 0,
        }
    }

    /// `true` se o recibo faz a mensagem avançar
    pub fn advances_from(&self, current: MessageStatus) -> bool {
        current != MessageStatus::Failed && self.rank() > current.rank()
    }
}

/// Registro de envio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatsAppMessage {
    pub id: String,
    pub session_id: String,
    pub phone: String,
    pub message: String,
    pub status: MessageStatus,
    pub message_id: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Contato de um disparo em massa
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkContact {
    pub phone: String,
    pub message: String,
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
}

/// Resultado de um item do disparo, na ordem de entrada
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub phone: String,
    pub name: Option<String>,
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkReport {
    pub total: usize,
    pub success_count: usize,
    pub results: Vec<BulkItemResult>,
}

/// Normaliza telefone para apenas dígitos (formato aceito pelos fornecedores)
pub fn normalize_phone(phone: &str) -> Result<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 8 || digits.len() > 15 {
        return Err(WhatsAppError::InvalidPhone(phone.to_string()));
    }
    Ok(digits)
}

/// Substitui `{nome}` / `{name}` pelo nome do contato
pub fn personalize(message: &str, name: Option<&str>) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => message.replace("{nome}", name).replace("{name}", name),
        None => message.to_string(),
    }
}
