/// Middleware de rate limiting
///
/// Identifica o cliente pela API key (hash SHA-256 de `X-Api-Key`, só para
/// chaves em `server.api_keys`) ou pelo IP de origem: o endereço da conexão,
/// ou `X-Forwarded-For` / `X-Real-IP` com `server.trust_proxy`. Toda resposta
/// leva `X-RateLimit-Limit`, `X-RateLimit-Remaining` e `X-RateLimit-Reset`;
/// a rejeição devolve 429 com `Retry-After`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::config::{RateLimitSettings, ServerSettings};
use crate::services::RateLimitDecision;
use crate::utils::logging::log_rate_limited;
use crate::utils::AppError;
use crate::AppState;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Identificador do cliente para o rate limiter
///
/// Chave fora da lista e headers de proxy sem `trust_proxy` são ignorados:
/// trocar esses valores a cada requisição não abre uma janela nova.
pub fn client_identifier(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    server: &ServerSettings,
) -> String {
    if let Some(key) = header_str(headers, "x-api-key") {
        if server.api_keys.iter().any(|known| known == key) {
            let digest = Sha256::digest(key.as_bytes());
            return format!("key:{}", hex::encode(digest));
        }
    }

    if server.trust_proxy {
        let forwarded = header_str(headers, "x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        if let Some(ip) = forwarded.or_else(|| header_str(headers, "x-real-ip")) {
            return format!("ip:{}", ip);
        }
    }

    match peer {
        Some(ip) => format!("ip:{}", ip),
        None => "anonymous".to_string(),
    }
}

/// IP da conexão TCP (`into_make_service_with_connect_info`)
fn peer_ip(request: &Request) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Limite geral das rotas `/api/*`
pub async fn api_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let limits = state.settings.rate_limit;
    enforce(&state, "api", limits, request, next).await
}

/// Limite restrito do teste de credenciais
pub async fn probe_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let limits = state.settings.probe_rate_limit;
    enforce(&state, "probe", limits, request, next).await
}

async fn enforce(
    state: &AppState,
    scope: &str,
    limits: RateLimitSettings,
    request: Request,
    next: Next,
) -> Response {
    let identifier =
        client_identifier(request.headers(), peer_ip(&request), &state.settings.server);
    let decision = state
        .rate_limiter
        .check_rate_limit(&format!("{}:{}", scope, identifier), &limits)
        .await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        log_rate_limited(&identifier, request.uri().path(), decision.retry_after_ms);
        AppError::RateLimited {
            retry_after_secs: decision.retry_after_secs(),
        }
        .into_response()
    };

    apply_headers(response.headers_mut(), &decision);
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at_secs()));
}
