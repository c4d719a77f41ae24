//! WhatsApp: sessões, QR e disparo de mensagens
//!
//! - `SessionManager`: máquina de estados da sessão (QR com validade, poll de
//!   status, snapshot persistido para reidratação)
//! - `BulkDispatcher`: envio único e disparo em massa sequencial
//! - `EvolutionClient` / `ZApiClient`: fornecedores suportados
//!
//! ## Uso
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use whatsapp::{BulkDispatcher, EvolutionClient, MemorySnapshotStore, MessageLog, SessionConfig, SessionManager};
//!
//! let provider = Arc::new(EvolutionClient::new("https://evolution.exemplo.com", "api-key")?);
//! let sessions = SessionManager::new("tenant-1", provider, Arc::new(MemorySnapshotStore::new()), SessionConfig::default());
//! let session = sessions.connect().await?;   // QR em session.qr_code
//!
//! let dispatcher = BulkDispatcher::new(sessions.clone(), MessageLog::default());
//! let report = dispatcher.send_bulk(&contacts).await?;
//! ```

pub mod dispatch;
pub mod error;
pub mod evolution;
pub mod history;
pub mod provider;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod types;
pub mod zapi;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::{BulkDispatcher, DEFAULT_SEND_DELAY};
pub use error::{Result, WhatsAppError};
pub use evolution::EvolutionClient;
pub use history::{MessageLog, DEFAULT_HISTORY_CAPACITY};
pub use provider::{ConnectionInfo, CreatedSession, WhatsAppProvider};
pub use scheduler::ScheduledTask;
pub use session::{SessionConfig, SessionManager, DEFAULT_QR_TTL};
pub use storage::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use types::{
    normalize_phone, BulkContact, BulkItemResult, BulkReport, MessageStatus, SessionSnapshot,
    SessionStatus, WhatsAppMessage, WhatsAppSession,
};
pub use zapi::{ZApiClient, DEFAULT_ZAPI_URL};
