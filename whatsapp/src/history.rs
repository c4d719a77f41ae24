//! Histórico recente de envios (mais recente primeiro, tamanho limitado)

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::types::{MessageStatus, WhatsAppMessage};

pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

#[derive(Clone)]
pub struct MessageLog {
    entries: Arc<RwLock<VecDeque<WhatsAppMessage>>>,
    capacity: usize,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub async fn record(&self, message: WhatsAppMessage) {
        let mut entries = self.entries.write().await;
        entries.push_front(message);
        entries.truncate(self.capacity);
    }

    /// Até `limit` mensagens, mais recentes primeiro
    pub async fn recent(&self, limit: usize) -> Vec<WhatsAppMessage> {
        self.entries.read().await.iter().take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Aplica um recibo de entrega/leitura pelo id do fornecedor.
    ///
    /// O status nunca regride (read > delivered > sent). `Failed` só vale
    /// para mensagens ainda não entregues. Devolve a mensagem se encontrada.
    pub async fn apply_receipt(
        &self,
        message_id: &str,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> Option<WhatsAppMessage> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|m| m.message_id.as_deref() == Some(message_id))?;

        match status {
            MessageStatus::Failed => {
                if matches!(entry.status, MessageStatus::Pending | MessageStatus::Sent) {
                    entry.status = MessageStatus::Failed;
                    entry
                        .error_message
                        .get_or_insert_with(|| "delivery failed".to_string());
                }
            }
            status if status.advances_from(entry.status) => {
                entry.status = status;
                match status {
                    MessageStatus::Delivered => {
                        entry.delivered_at.get_or_insert(at);
                    }
                    MessageStatus::Read => {
                        entry.delivered_at.get_or_insert(at);
                        entry.read_at.get_or_insert(at);
                    }
                    _ => {}
                }
            }
            _ => {}
        }

        Some(entry.clone())
    }
}
