//! Contrato comum dos fornecedores de WhatsApp

use async_trait::async_trait;
use reqwest::Response;
use serde_json::Value;

use crate::error::{Result, WhatsAppError};

/// Sessão recém-criada no fornecedor
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedSession {
    pub session_id: String,
    pub qr_code: Option<String>,
}

/// Resultado de uma consulta de status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionInfo {
    pub connected: bool,
    pub phone_number: Option<String>,
    pub profile_name: Option<String>,
}

#[async_trait]
pub trait WhatsAppProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cria a sessão e devolve o QR inicial
    async fn create_session(&self, instance_name: &str) -> Result<CreatedSession>;

    /// Gera um novo QR para a sessão
    async fn refresh_qr(&self, session_id: &str) -> Result<Option<String>>;

    async fn connection_status(&self, session_id: &str) -> Result<ConnectionInfo>;

    /// Envia texto; devolve o id da mensagem atribuído pelo fornecedor
    async fn send_text(&self, session_id: &str, phone: &str, message: &str) -> Result<String>;

    async fn disconnect(&self, session_id: &str) -> Result<()>;

    /// Remove a sessão do fornecedor depois do logout. Fornecedores cuja
    /// sessão é fixa (Z-API) não têm o que remover.
    async fn delete_session(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }

    /// `false` quando todas as sessões caem na mesma instância do fornecedor
    fn supports_multiple_sessions(&self) -> bool {
        true
    }
}

/// Converte a resposta do fornecedor em JSON, mapeando status de erro
pub(crate) async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(WhatsAppError::Provider {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

/// Extrai a mensagem de erro dos formatos conhecidos, ou o corpo cru
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|json| {
        let candidates = [
            json.pointer("/response/message"),
            json.get("message"),
            json.get("error"),
        ];
        candidates.into_iter().flatten().find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(items) if !items.is_empty() => Some(
                items
                    .iter()
                    .map(|i| i.as_str().map(str::to_string).unwrap_or_else(|| i.to_string()))
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            _ => None,
        })
    });

    from_json.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "empty response".to_string()
        } else {
            trimmed.chars().take(200).collect()
        }
    })
}

/// Primeira string não vazia entre os caminhos JSON (ponteiros RFC 6901)
pub(crate) fn first_string(json: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| json.pointer(p))
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message_formats() {
        assert_eq!(
            error_message(r#"{"status":403,"error":"Forbidden","response":{"message":["Instance already in use"]}}"#),
            "Instance already in use"
        );
        assert_eq!(error_message(r#"{"error":"NOT_FOUND"}"#), "NOT_FOUND");
        assert_eq!(error_message("Bad gateway"), "Bad gateway");
        assert_eq!(error_message(""), "empty response");
    }

    #[test]
    fn test_first_string() {
        let body = json!({"qrcode": {"base64": ""}, "base64": "data:image/png;base64,AAA"});
        assert_eq!(
            first_string(&body, &["/qrcode/base64", "/base64"]).as_deref(),
            Some("data:image/png;base64,AAA")
        );
    }
}
