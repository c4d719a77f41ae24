//! Disparo de mensagens: envio único e em massa
//!
//! O disparo em massa é estritamente sequencial, com intervalo fixo entre
//! envios (nunca depois do último). Falha em um contato não interrompe os
//! demais: cada resultado entra no relatório, na ordem de entrada.

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::history::MessageLog;
use crate::session::SessionManager;
use crate::types::{
    normalize_phone, personalize, BulkContact, BulkItemResult, BulkReport, MessageStatus,
    WhatsAppMessage,
};

/// Intervalo entre envios de um disparo em massa
pub const DEFAULT_SEND_DELAY: Duration = Duration::from_millis(2000);

#[derive(Clone)]
pub struct BulkDispatcher {
    sessions: SessionManager,
    history: MessageLog,
    delay: Duration,
}

impl BulkDispatcher {
    pub fn new(sessions: SessionManager, history: MessageLog) -> Self {
        Self {
            sessions,
            history,
            delay: DEFAULT_SEND_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn history(&self) -> &MessageLog {
        &self.history
    }

    /// Envia uma mensagem. Só falha (`Err`) se a sessão não estiver
    /// conectada; erro de envio vira registro com status `failed`.
    pub async fn send_one(&self, phone: &str, message: &str) -> Result<WhatsAppMessage> {
        let session_id = self.sessions.connected_session_id().await?;
        Ok(self.deliver(&session_id, phone, message).await)
    }

    /// Disparo em massa. Falha imediatamente, sem nenhum envio, se a sessão
    /// não estiver conectada.
    pub async fn send_bulk(&self, contacts: &[BulkContact]) -> Result<BulkReport> {
        let session_id = self.sessions.connected_session_id().await?;

        tracing::info!(
            "📤 Iniciando disparo para {} contatos (intervalo {}ms)",
            contacts.len(),
            self.delay.as_millis()
        );

        let mut results = Vec::with_capacity(contacts.len());
        for (index, contact) in contacts.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.delay).await;
            }

            let text = personalize(&contact.message, contact.name.as_deref());
            let record = self.deliver(&session_id, &contact.phone, &text).await;
            let success = record.status == MessageStatus::Sent;

            results.push(BulkItemResult {
                phone: contact.phone.clone(),
                name: contact.name.clone(),
                success,
                message_id: record.message_id,
                error: record.error_message,
            });
        }

        let success_count = results.iter().filter(|r| r.success).count();
        tracing::info!(
            "✅ Disparo concluído: {}/{} enviados",
            success_count,
            results.len()
        );

        Ok(BulkReport {
            total: results.len(),
            success_count,
            results,
        })
    }

    async fn deliver(&self, session_id: &str, phone: &str, text: &str) -> WhatsAppMessage {
        let mut record = WhatsAppMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            phone: phone.to_string(),
            message: text.to_string(),
            status: MessageStatus::Pending,
            message_id: None,
            sent_at: Utc::now(),
            delivered_at: None,
            read_at: None,
            error_message: None,
        };

        let sent = match normalize_phone(phone) {
            Ok(digits) => {
                record.phone = digits;
                self.sessions
                    .provider()
                    .send_text(session_id, &record.phone, text)
                    .await
            }
            Err(e) => Err(e),
        };

        match sent {
            Ok(message_id) => {
                record.status = MessageStatus::Sent;
                record.message_id = Some(message_id);
            }
            Err(e) => {
                tracing::warn!("⚠️ Falha ao enviar para {}: {}", record.phone, e);
                record.status = MessageStatus::Failed;
                record.error_message = Some(e.to_string());
            }
        }

        self.history.record(record.clone()).await;
        record
    }
}
