//! Cliente da Evolution API (Baileys)
//!
//! Autenticação via header `apikey`. Cada sessão é uma instância nomeada.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};

use crate::error::{Result, WhatsAppError};
use crate::provider::{first_string, read_json, ConnectionInfo, CreatedSession, WhatsAppProvider};

#[derive(Clone)]
pub struct EvolutionClient {
    http_client: HttpClient,
    base_url: String,
    api_key: String,
}

impl EvolutionClient {
    /// Cria um cliente com timeouts padrão (30s total, 5s connect)
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| WhatsAppError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn instance_path(prefix: &str, instance: &str) -> String {
        format!("{}/{}", prefix, urlencoding::encode(instance))
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self
            .http_client
            .get(self.url(path))
            .header("apikey", &self.api_key)
            .send()
            .await?;
        read_json(response).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self
            .http_client
            .post(self.url(path))
            .header("apikey", &self.api_key)
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }

    async fn delete(&self, path: &str) -> Result<Value> {
        let response = self
            .http_client
            .delete(self.url(path))
            .header("apikey", &self.api_key)
            .send()
            .await?;
        read_json(response).await
    }

    /// Telefone e nome do perfil via `fetchInstances`
    async fn fetch_profile(&self, instance: &str) -> Result<(Option<String>, Option<String>)> {
        let path = format!(
            "/instance/fetchInstances?instanceName={}",
            urlencoding::encode(instance)
        );
        let body = self.get(&path).await?;

        let entry = match &body {
            Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
            other => other.clone(),
        };
        // v1 aninha em `instance`, v2 devolve os campos no topo
        let entry = entry.get("instance").cloned().unwrap_or(entry);

        let phone = first_string(&entry, &["/ownerJid", "/owner", "/number"])
            .map(|jid| jid.split('@').next().unwrap_or_default().to_string())
            .filter(|p| !p.is_empty());
        let profile = first_string(&entry, &["/profileName"]);

        Ok((phone, profile))
    }
}

#[async_trait]
impl WhatsAppProvider for EvolutionClient {
    fn name(&self) -> &'static str {
        "evolution"
    }

    async fn create_session(&self, instance_name: &str) -> Result<CreatedSession> {
        tracing::info!("📱 Evolution: criando instância {}", instance_name);

        let body = self
            .post(
                "/instance/create",
                &json!({
                    "instanceName": instance_name,
                    "integration": "WHATSAPP-BAILEYS",
                    "qrcode": true,
                }),
            )
            .await?;

        let session_id = first_string(&body, &["/instance/instanceName"])
            .unwrap_or_else(|| instance_name.to_string());
        let qr_code = first_string(&body, &["/qrcode/base64", "/base64", "/qrcode/code"]);

        Ok(CreatedSession { session_id, qr_code })
    }

    async fn refresh_qr(&self, session_id: &str) -> Result<Option<String>> {
        let body = self
            .get(&Self::instance_path("/instance/connect", session_id))
            .await?;
        Ok(first_string(&body, &["/base64", "/qrcode/base64", "/code"]))
    }

    async fn connection_status(&self, session_id: &str) -> Result<ConnectionInfo> {
        let body = self
            .get(&Self::instance_path("/instance/connectionState", session_id))
            .await?;
        let state = first_string(&body, &["/instance/state", "/state"]).unwrap_or_default();

        if state != "open" {
            return Ok(ConnectionInfo::default());
        }

        let (phone_number, profile_name) = match self.fetch_profile(session_id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("⚠️ Evolution: perfil de {} indisponível: {}", session_id, e);
                (None, None)
            }
        };

        Ok(ConnectionInfo {
            connected: true,
            phone_number,
            profile_name,
        })
    }

    async fn send_text(&self, session_id: &str, phone: &str, message: &str) -> Result<String> {
        let body = self
            .post(
                &Self::instance_path("/message/sendText", session_id),
                &json!({ "number": phone, "text": message }),
            )
            .await?;

        first_string(&body, &["/key/id", "/messageId", "/id"]).ok_or_else(|| {
            WhatsAppError::Provider {
                status: 200,
                message: "send response without message id".to_string(),
            }
        })
    }

    async fn disconnect(&self, session_id: &str) -> Result<()> {
        self.delete(&Self::instance_path("/instance/logout", session_id))
            .await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        tracing::info!("🗑️ Evolution: removendo instância {}", session_id);
        self.delete(&Self::instance_path("/instance/delete", session_id))
            .await?;
        Ok(())
    }
}
