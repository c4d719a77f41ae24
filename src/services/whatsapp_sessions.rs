use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use whatsapp::{
    BulkDispatcher, EvolutionClient, FileSnapshotStore, MemorySnapshotStore, MessageLog,
    MessageStatus, SessionConfig, SessionManager, SessionStatus, SnapshotStore, WhatsAppError,
    WhatsAppMessage, WhatsAppProvider, ZApiClient,
};

use crate::config::{WhatsAppProviderKind, WhatsAppSettings};
use crate::utils::{AppError, AppResult};

/// Tenant usado quando a requisição não informa `X-Tenant-Id`
pub const DEFAULT_TENANT: &str = "default";

/// Sessão e disparador de um tenant
#[derive(Clone)]
pub struct TenantWhatsApp {
    pub sessions: SessionManager,
    pub dispatcher: BulkDispatcher,
}

impl TenantWhatsApp {
    pub fn history(&self) -> &MessageLog {
        self.dispatcher.history()
    }
}

/// Registro de sessões WhatsApp por tenant.
///
/// Cada tenant tem máquina de estados, QR, histórico e snapshot próprios;
/// o fornecedor (Evolution ou Z-API) é compartilhado. A Z-API tem um único
/// aparelho por instância, então só atende o tenant `default`.
///
/// O registro guarda no máximo `max_tenants`; cheio, tenants ociosos são
/// descartados para abrir espaço.
#[derive(Clone)]
pub struct WhatsAppSessions {
    tenants: Arc<RwLock<HashMap<String, TenantWhatsApp>>>,
    provider: Option<Arc<dyn WhatsAppProvider>>,
    store: Arc<dyn SnapshotStore>,
    session_config: SessionConfig,
    send_delay: Duration,
    history_capacity: usize,
    poll_interval: Duration,
    bulk_max_contacts: usize,
    max_tenants: usize,
}

impl WhatsAppSessions {
    pub fn new(
        provider: Option<Arc<dyn WhatsAppProvider>>,
        store: Arc<dyn SnapshotStore>,
        settings: &WhatsAppSettings,
    ) -> Self {
        Self {
            tenants: Arc::new(RwLock::new(HashMap::new())),
            provider,
            store,
            session_config: SessionConfig {
                qr_ttl: Duration::from_secs(settings.qr_ttl_secs),
                instance_prefix: settings.instance_prefix.clone(),
            },
            send_delay: Duration::from_millis(settings.send_delay_ms),
            history_capacity: settings.history_capacity,
            poll_interval: Duration::from_secs(settings.poll_interval_secs.max(1)),
            bulk_max_contacts: settings.bulk_max_contacts,
            max_tenants: settings.max_tenants.max(1),
        }
    }

    /// Monta fornecedor e armazenamento de snapshots a partir da configuração
    pub fn from_settings(settings: &WhatsAppSettings) -> Result<Self, WhatsAppError> {
        let provider: Option<Arc<dyn WhatsAppProvider>> = match settings.provider {
            WhatsAppProviderKind::Disabled => {
                tracing::warn!("⚠️ WhatsApp desabilitado (whatsapp.provider = disabled)");
                None
            }
            WhatsAppProviderKind::Evolution => {
                let url = settings.evolution_url.as_deref().ok_or_else(|| {
                    WhatsAppError::ConfigError("whatsapp.evolution_url não configurado".to_string())
                })?;
                let api_key = settings.evolution_api_key.as_deref().ok_or_else(|| {
                    WhatsAppError::ConfigError(
                        "whatsapp.evolution_api_key não configurado".to_string(),
                    )
                })?;
                tracing::info!("📱 WhatsApp via Evolution API: {}", url);
                Some(Arc::new(EvolutionClient::new(url, api_key)?))
            }
            WhatsAppProviderKind::Zapi => {
                let instance_id = settings.zapi_instance_id.as_deref().ok_or_else(|| {
                    WhatsAppError::ConfigError("whatsapp.zapi_instance_id não configurado".to_string())
                })?;
                let token = settings.zapi_token.as_deref().ok_or_else(|| {
                    WhatsAppError::ConfigError("whatsapp.zapi_token não configurado".to_string())
                })?;
                tracing::info!("📱 WhatsApp via Z-API: instância {}", instance_id);
                Some(Arc::new(ZApiClient::new(
                    settings.zapi_url.as_str(),
                    instance_id,
                    token,
                    settings.zapi_client_token.clone(),
                )?))
            }
        };

        let store: Arc<dyn SnapshotStore> = match &settings.snapshot_dir {
            Some(dir) => {
                tracing::info!("💾 Snapshots de sessão em {}", dir);
                Arc::new(FileSnapshotStore::new(dir))
            }
            None => Arc::new(MemorySnapshotStore::new()),
        };

        Ok(Self::new(provider, store, settings))
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|p| p.name())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn bulk_max_contacts(&self) -> usize {
        self.bulk_max_contacts
    }

    /// Sessão do tenant, criada (e reidratada do snapshot) no primeiro uso
    pub async fn tenant(&self, tenant_id: &str) -> AppResult<TenantWhatsApp> {
        if let Some(existing) = self.tenants.read().await.get(tenant_id) {
            return Ok(existing.clone());
        }

        let provider = self.provider.clone().ok_or_else(|| {
            AppError::ServiceUnavailable(
                "WhatsApp não configurado (whatsapp.provider = disabled)".to_string(),
            )
        })?;
        if !provider.supports_multiple_sessions() && tenant_id != DEFAULT_TENANT {
            return Err(AppError::ValidationError(format!(
                "o fornecedor {} atende apenas o tenant '{}'",
                provider.name(),
                DEFAULT_TENANT
            )));
        }

        // Reidratação fora do lock do registro
        let sessions = SessionManager::new(
            tenant_id,
            provider,
            self.store.clone(),
            self.session_config.clone(),
        );
        let rehydrated = match sessions.rehydrate().await {
            Ok(session) => Some(session.status),
            Err(e) => {
                tracing::warn!("⚠️ Snapshot do tenant {} ignorado: {}", tenant_id, e);
                None
            }
        };

        let tenant = {
            let mut tenants = self.tenants.write().await;
            if let Some(existing) = tenants.get(tenant_id) {
                return Ok(existing.clone());
            }
            if tenants.len() >= self.max_tenants {
                Self::evict_idle(&mut tenants).await;
            }
            if tenants.len() >= self.max_tenants {
                tracing::warn!(
                    "⚠️ Limite de {} tenants WhatsApp atingido, {} recusado",
                    self.max_tenants,
                    tenant_id
                );
                return Err(AppError::ServiceUnavailable(format!(
                    "limite de {} tenants WhatsApp atingido",
                    self.max_tenants
                )));
            }

            let dispatcher =
                BulkDispatcher::new(sessions.clone(), MessageLog::new(self.history_capacity))
                    .with_delay(self.send_delay);
            let tenant = TenantWhatsApp {
                sessions,
                dispatcher,
            };
            tenants.insert(tenant_id.to_string(), tenant.clone());
            tenant
        };
        tracing::debug!("📱 Tenant {} registrado", tenant_id);

        if rehydrated == Some(SessionStatus::Connecting) {
            tenant.sessions.start_status_polling(self.poll_interval).await;
        }
        Ok(tenant)
    }

    /// Remove tenants sem sessão aberta no fornecedor
    async fn evict_idle(tenants: &mut HashMap<String, TenantWhatsApp>) {
        let mut idle = Vec::new();
        for (id, tenant) in tenants.iter() {
            if tenant.sessions.is_idle().await {
                idle.push(id.clone());
            }
        }
        for id in &idle {
            tenants.remove(id);
        }
        if !idle.is_empty() {
            tracing::info!("🧹 {} tenants WhatsApp ociosos descartados", idle.len());
        }
    }

    /// Aplica um recibo de entrega/leitura no histórico de quem enviou
    pub async fn apply_receipt(
        &self,
        message_id: &str,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> Option<WhatsAppMessage> {
        let tenants: Vec<TenantWhatsApp> = self.tenants.read().await.values().cloned().collect();
        for tenant in tenants {
            if let Some(updated) = tenant.history().apply_receipt(message_id, status, at).await {
                return Some(updated);
            }
        }
        None
    }

    pub async fn tenant_count(&self) -> usize {
        self.tenants.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn settings() -> WhatsAppSettings {
        WhatsAppSettings {
            send_delay_ms: 0,
            ..WhatsAppSettings::default()
        }
    }

    fn evolution(server: &MockServer) -> Option<Arc<dyn WhatsAppProvider>> {
        Some(Arc::new(
            EvolutionClient::new(server.base_url(), "test-key").unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_disabled_provider_rejects_tenants() {
        let registry = WhatsAppSessions::from_settings(&WhatsAppSettings::default()).unwrap();
        assert!(!registry.is_enabled());
        assert!(matches!(
            registry.tenant("default").await,
            Err(AppError::ServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_zapi_serves_only_default_tenant() {
        let zapi = WhatsAppSettings {
            provider: WhatsAppProviderKind::Zapi,
            zapi_url: "http://127.0.0.1:9".to_string(),
            zapi_instance_id: Some("INST1".to_string()),
            zapi_token: Some("TOK1".to_string()),
            ..settings()
        };
        let registry = WhatsAppSessions::from_settings(&zapi).unwrap();

        let default = registry.tenant(DEFAULT_TENANT).await.unwrap();
        assert_eq!(default.sessions.key(), DEFAULT_TENANT);
        assert!(matches!(
            registry.tenant("loja-b").await,
            Err(AppError::ValidationError(_))
        ));
        assert_eq!(registry.tenant_count().await, 1);
    }

    #[tokio::test]
    async fn test_idle_tenants_are_evicted_at_capacity() {
        let server = MockServer::start_async().await;
        let registry = WhatsAppSessions::new(
            evolution(&server),
            Arc::new(MemorySnapshotStore::new()),
            &WhatsAppSettings {
                max_tenants: 2,
                ..settings()
            },
        );

        registry.tenant("loja-a").await.unwrap();
        registry.tenant("loja-b").await.unwrap();
        assert_eq!(registry.tenant_count().await, 2);

        // Ambos ociosos: dão lugar ao novo
        registry.tenant("loja-c").await.unwrap();
        assert_eq!(registry.tenant_count().await, 1);
        assert!(registry.tenant("loja-c").await.is_ok());
    }

    #[tokio::test]
    async fn test_tenant_limit_rejects_when_none_idle() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/instance/create");
                then.status(201).json_body(json!({
                    "instance": { "instanceName": "gestor-a" },
                    "qrcode": { "base64": "data:image/png;base64,AAA" }
                }));
            })
            .await;

        let registry = WhatsAppSessions::new(
            evolution(&server),
            Arc::new(MemorySnapshotStore::new()),
            &WhatsAppSettings {
                max_tenants: 1,
                ..settings()
            },
        );

        let a = registry.tenant("loja-a").await.unwrap();
        a.sessions.connect().await.unwrap();

        assert!(matches!(
            registry.tenant("loja-b").await,
            Err(AppError::ServiceUnavailable(_))
        ));
        assert_eq!(registry.tenant_count().await, 1);
        assert!(registry.tenant("loja-a").await.is_ok());
    }

    #[tokio::test]
    async fn test_connecting_snapshot_is_rehydrated_once() {
        let store = Arc::new(MemorySnapshotStore::new());
        store
            .save(
                "loja-a",
                &whatsapp::SessionSnapshot {
                    session_id: "gestor-a".to_string(),
                    status: SessionStatus::Connecting,
                    qr_code: Some("data:image/png;base64,AAA".to_string()),
                    timestamp: Utc::now(),
                    connected_at: None,
                    disconnected_at: None,
                },
            )
            .await
            .unwrap();

        let server = MockServer::start_async().await;
        let registry = WhatsAppSessions::new(evolution(&server), store, &settings());

        let (first, second) = tokio::join!(registry.tenant("loja-a"), registry.tenant("loja-a"));
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(registry.tenant_count().await, 1);
        assert_eq!(
            first.sessions.session().await.session_id,
            second.sessions.session().await.session_id
        );
        assert_eq!(
            first.sessions.session().await.status,
            SessionStatus::Connecting
        );
    }

    #[test]
    fn test_evolution_requires_url_and_key() {
        let settings = WhatsAppSettings {
            provider: WhatsAppProviderKind::Evolution,
            ..WhatsAppSettings::default()
        };
        assert!(matches!(
            WhatsAppSessions::from_settings(&settings),
            Err(WhatsAppError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_tenants_are_isolated_and_reused() {
        let server = MockServer::start_async().await;
        let registry =
            WhatsAppSessions::new(evolution(&server), Arc::new(MemorySnapshotStore::new()), &settings());

        let a = registry.tenant("loja-a").await.unwrap();
        let again = registry.tenant("loja-a").await.unwrap();
        let b = registry.tenant("loja-b").await.unwrap();

        assert_eq!(registry.tenant_count().await, 2);
        assert_eq!(a.sessions.key(), again.sessions.key());
        assert_eq!(b.sessions.key(), "loja-b");
        assert_eq!(a.sessions.session().await.status, SessionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_receipt_reaches_sender_history() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path_contains("/instance/create");
                then.status(201).json_body(json!({
                    "instance": { "instanceName": "gestor-x" },
                    "qrcode": { "base64": "data:image/png;base64,AAA" }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path_contains("/instance/connectionState/");
                then.status(200)
                    .json_body(json!({ "instance": { "state": "open" } }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/instance/fetchInstances");
                then.status(200).json_body(json!([]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path_contains("/message/sendText/");
                then.status(201)
                    .json_body(json!({ "key": { "id": "EVO-MSG-1" } }));
            })
            .await;

        let registry =
            WhatsAppSessions::new(evolution(&server), Arc::new(MemorySnapshotStore::new()), &settings());
        let tenant = registry.tenant("loja-a").await.unwrap();
        tenant.sessions.connect().await.unwrap();
        tenant.sessions.poll_status().await.unwrap();

        let sent = tenant
            .dispatcher
            .send_one("5511999998888", "Seu acesso foi renovado")
            .await
            .unwrap();
        assert_eq!(sent.message_id.as_deref(), Some("EVO-MSG-1"));

        let updated = registry
            .apply_receipt("EVO-MSG-1", MessageStatus::Delivered, Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.status, MessageStatus::Delivered);
        assert!(registry
            .apply_receipt("desconhecido", MessageStatus::Read, Utc::now())
            .await
            .is_none());
    }
}
