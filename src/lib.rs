// Biblioteca do middleware Gestor
// Expõe estado, rotas e módulos para o binário e para os testes

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use provedores::{ProviderProber, Registry};

use crate::config::Settings;
use crate::handlers::{whatsapp_api, *};
use crate::services::{RateLimiter, WhatsAppSessions};
use crate::utils::logging::log_info;
use crate::utils::{AppError, AppResult};

// AppState é definido aqui para ser compartilhado
pub struct AppState {
    pub settings: Settings,
    pub registry: Arc<Registry>,
    pub prober: ProviderProber,
    pub rate_limiter: RateLimiter,
    pub whatsapp: WhatsAppSessions,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        registry: Registry,
        prober: ProviderProber,
        whatsapp: WhatsAppSessions,
    ) -> Self {
        Self {
            settings,
            registry: Arc::new(registry),
            prober,
            rate_limiter: RateLimiter::new(),
            whatsapp,
            started_at: Utc::now(),
        }
    }

    /// Monta registro, prober e sessões WhatsApp a partir da configuração
    pub async fn from_settings(settings: Settings) -> AppResult<Self> {
        settings
            .validate()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        let mut registry = Registry::builtin();
        if let Some(path) = &settings.provedores.strategies_file {
            let applied = registry.load_overrides_from_file(path).await?;
            log_info(&format!("📄 {} estratégias carregadas de {}", applied, path));
        }
        registry.validate()?;

        let prober = ProviderProber::with_timeouts(
            settings.provedores.timeout_secs,
            settings.provedores.connect_timeout_secs,
        )?;
        let whatsapp = WhatsAppSessions::from_settings(&settings.whatsapp)?;

        Ok(Self::new(settings, registry, prober, whatsapp))
    }
}

/// Rotas do serviço
///
/// - `/health`, `/status` e `/webhooks/whatsapp`: sem rate limit
/// - `/api/provedores/testar`: limite restrito (`probe_rate_limit`)
/// - demais `/api/*`: limite geral (`rate_limit`)
pub fn build_router(state: Arc<AppState>) -> Router {
    let probe_routes = Router::new()
        .route("/api/provedores/testar", post(testar_provedor))
        .layer(from_fn_with_state(state.clone(), middleware::probe_rate_limit));

    let api_routes = Router::new()
        .route("/api/provedores", get(list_provedores))
        .route("/api/whatsapp/connect", post(whatsapp_api::connect))
        .route("/api/whatsapp/status", get(whatsapp_api::status))
        .route("/api/whatsapp/qr/refresh", post(whatsapp_api::refresh_qr))
        .route("/api/whatsapp/disconnect", post(whatsapp_api::disconnect))
        .route("/api/whatsapp/send", post(whatsapp_api::send))
        .route("/api/whatsapp/bulk", post(whatsapp_api::bulk))
        .route("/api/whatsapp/messages", get(whatsapp_api::messages))
        .layer(from_fn_with_state(state.clone(), middleware::api_rate_limit));

    Router::new()
        // Health checks (públicos)
        .route("/health", get(health_check))
        .route("/status", get(status_check))
        // Recibos do fornecedor WhatsApp
        .route("/webhooks/whatsapp", post(handle_whatsapp_webhook))
        .merge(probe_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
