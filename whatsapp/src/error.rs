//! Tipos de erro para o crate whatsapp

use thiserror::Error;

/// Erros possíveis nas operações de sessão e envio
#[derive(Debug, Error)]
pub enum WhatsAppError {
    /// Envio tentado sem sessão conectada
    #[error("WhatsApp session is not connected")]
    NotConnected,

    /// Operação que exige uma sessão existente
    #[error("No active WhatsApp session")]
    NoSession,

    /// Operação incompatível com o estado atual da sessão
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Resposta de erro do fornecedor (Evolution API, Z-API)
    #[error("Provider error (HTTP {status}): {message}")]
    Provider { status: u16, message: String },

    /// Falha de transporte (timeout, conexão recusada)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Erro de parsing JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Falha ao persistir ou ler o snapshot da sessão
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl WhatsAppError {
    /// Falha de rede: não altera o estado da sessão
    pub fn is_transport(&self) -> bool {
        matches!(self, WhatsAppError::Http(_))
    }
}

impl From<std::io::Error> for WhatsAppError {
    fn from(err: std::io::Error) -> Self {
        WhatsAppError::Storage(err.to_string())
    }
}

/// Tipo Result padrão para o crate
pub type Result<T> = std::result::Result<T, WhatsAppError>;
