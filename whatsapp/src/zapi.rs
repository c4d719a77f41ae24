//! Cliente da Z-API
//!
//! Uma instância Z-API já existe do lado do fornecedor; a "sessão" é a
//! própria instância. Rotas sob `/instances/{id}/token/{token}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder};
use serde_json::{json, Value};

use crate::error::{Result, WhatsAppError};
use crate::provider::{first_string, read_json, ConnectionInfo, CreatedSession, WhatsAppProvider};

pub const DEFAULT_ZAPI_URL: &str = "https://api.z-api.io";

#[derive(Clone)]
pub struct ZApiClient {
    http_client: HttpClient,
    base_url: String,
    instance_id: String,
    client_token: Option<String>,
}

impl ZApiClient {
    pub fn new(
        base_url: impl Into<String>,
        instance_id: impl Into<String>,
        instance_token: impl Into<String>,
        client_token: Option<String>,
    ) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| WhatsAppError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        let instance_id = instance_id.into();
        let base_url = format!(
            "{}/instances/{}/token/{}",
            base_url.into().trim_end_matches('/'),
            urlencoding::encode(&instance_id),
            urlencoding::encode(&instance_token.into())
        );

        Ok(Self {
            http_client,
            base_url,
            instance_id,
            client_token: client_token.filter(|t| !t.is_empty()),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.client_token {
            Some(token) => request.header("Client-Token", token),
            None => request,
        }
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let request = self.http_client.get(format!("{}{}", self.base_url, path));
        let response = self.authorize(request).send().await?;
        read_json(response).await
    }

    /// A Z-API responde 200 com `{"error": ...}` em alguns casos
    fn reject_inline_error(body: &Value) -> Result<()> {
        if let Some(error) = body.get("error").and_then(Value::as_str) {
            if !error.is_empty() && body.get("connected").is_none() {
                return Err(WhatsAppError::Provider {
                    status: 200,
                    message: error.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn qr_image(&self) -> Result<Option<String>> {
        let body = self.get("/qr-code/image").await?;
        Self::reject_inline_error(&body)?;
        Ok(first_string(&body, &["/value"]))
    }
}

#[async_trait]
impl WhatsAppProvider for ZApiClient {
    fn name(&self) -> &'static str {
        "zapi"
    }

    async fn create_session(&self, _instance_name: &str) -> Result<CreatedSession> {
        tracing::info!("📱 Z-API: gerando QR da instância {}", self.instance_id);
        let qr_code = self.qr_image().await?;
        Ok(CreatedSession {
            session_id: self.instance_id.clone(),
            qr_code,
        })
    }

    async fn refresh_qr(&self, _session_id: &str) -> Result<Option<String>> {
        self.qr_image().await
    }

    async fn connection_status(&self, _session_id: &str) -> Result<ConnectionInfo> {
        let body = self.get("/status").await?;
        let connected = body
            .get("connected")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !connected {
            return Ok(ConnectionInfo::default());
        }

        let (phone_number, profile_name) = match self.get("/device").await {
            Ok(device) => (
                first_string(&device, &["/phone"]),
                first_string(&device, &["/name", "/sessionName"]),
            ),
            Err(e) => {
                tracing::warn!("⚠️ Z-API: dados do aparelho indisponíveis: {}", e);
                (None, None)
            }
        };

        Ok(ConnectionInfo {
            connected: true,
            phone_number,
            profile_name,
        })
    }

    async fn send_text(&self, _session_id: &str, phone: &str, message: &str) -> Result<String> {
        let request = self
            .http_client
            .post(format!("{}/send-text", self.base_url))
            .json(&json!({ "phone": phone, "message": message }));
        let body = read_json(self.authorize(request).send().await?).await?;
        Self::reject_inline_error(&body)?;

        first_string(&body, &["/messageId", "/zaapId", "/id"]).ok_or_else(|| {
            WhatsAppError::Provider {
                status: 200,
                message: "send response without message id".to_string(),
            }
        })
    }

    async fn disconnect(&self, _session_id: &str) -> Result<()> {
        self.get("/disconnect").await?;
        Ok(())
    }

    /// Um único aparelho por instância configurada
    fn supports_multiple_sessions(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> ZApiClient {
        ZApiClient::new(server.base_url(), "INST1", "TOK1", Some("CT1".to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_qr_and_status() {
        let server = MockServer::start_async().await;
        let qr = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/instances/INST1/token/TOK1/qr-code/image")
                    .header("Client-Token", "CT1");
                then.status(200)
                    .json_body(json!({"value": "data:image/png;base64,ZQR"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/instances/INST1/token/TOK1/status");
                then.status(200).json_body(json!({
                    "connected": true,
                    "error": "",
                    "smartphoneConnected": true
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/instances/INST1/token/TOK1/device");
                then.status(200)
                    .json_body(json!({"phone": "5521988887777", "name": "Revenda RJ"}));
            })
            .await;

        let client = client(&server);
        assert!(!client.supports_multiple_sessions());
        let created = client.create_session("ignored").await.unwrap();
        qr.assert_async().await;
        assert_eq!(created.session_id, "INST1");
        assert_eq!(created.qr_code.as_deref(), Some("data:image/png;base64,ZQR"));

        let info = client.connection_status("INST1").await.unwrap();
        assert!(info.connected);
        assert_eq!(info.phone_number.as_deref(), Some("5521988887777"));
        assert_eq!(info.profile_name.as_deref(), Some("Revenda RJ"));
    }

    #[tokio::test]
    async fn test_send_text() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/instances/INST1/token/TOK1/send-text")
                    .json_body(json!({"phone": "5521988887777", "message": "Oi"}));
                then.status(200).json_body(json!({
                    "zaapId": "Z1",
                    "messageId": "M1",
                    "id": "M1"
                }));
            })
            .await;

        let id = client(&server)
            .send_text("INST1", "5521988887777", "Oi")
            .await
            .unwrap();
        assert_eq!(id, "M1");
    }

    #[tokio::test]
    async fn test_inline_error_is_provider_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/instances/INST1/token/TOK1/qr-code/image");
                then.status(200)
                    .json_body(json!({"error": "Instance not found"}));
            })
            .await;

        let err = client(&server).refresh_qr("INST1").await.unwrap_err();
        assert!(matches!(err, WhatsAppError::Provider { .. }));
    }
}
