//! Prober de autenticação em painéis desconhecidos
//!
//! Executa uma `TestStrategy` contra `(base_url, usuário, senha)`:
//! - passos na ordem declarada, um de cada vez
//! - dentro do passo, endpoints na ordem declarada
//! - 404 ou resposta inconclusiva: próximo endpoint
//! - sucesso: encerra o teste inteiro
//! - falha de autenticação ou erro de rede: abandona o passo, segue para o próximo
//!
//! Nenhuma falha de tentativa vira `Err`: tudo entra na trilha de diagnóstico.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, LOCATION, REFERER};
use reqwest::{redirect, Client as HttpClient, Response};
use serde::{Deserialize, Serialize};

use crate::classifier::{classify, verdict_for, AttemptVerdict, ResponseClass, ResponseView};
use crate::error::{ProvedorError, Result};
use crate::form::{extract_csrf_token, payload_to_form_pairs, CookieJar};
use crate::registry::{default_payload, ProviderConfig, Registry};
use crate::strategy::{StepKind, TestStep, TestStrategy};

/// Tamanho máximo do trecho de corpo guardado no diagnóstico
const EXCERPT_MAX_BYTES: usize = 300;

/// Credenciais a validar
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Resultado de uma tentativa contra um endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub step_index: usize,
    pub step_type: StepKind,
    pub label: String,
    pub endpoint: String,
    pub succeeded: bool,
    pub verdict: AttemptVerdict,
    pub http_status: Option<u16>,
    pub raw_body_excerpt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ResponseClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Veredito final de um teste
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub success: bool,
    pub base_url: String,
    pub message: String,
    pub winning_step: Option<ProbeOutcome>,
    /// Trilha completa, na ordem em que as tentativas aconteceram
    pub attempts: Vec<ProbeOutcome>,
}

/// Contexto de uma tentativa (qual passo, qual endpoint)
struct Attempt<'a> {
    step_index: usize,
    step: &'a TestStep,
    endpoint: String,
    url: String,
}

impl Attempt<'_> {
    fn outcome(&self, verdict: AttemptVerdict) -> ProbeOutcome {
        ProbeOutcome {
            step_index: self.step_index,
            step_type: self.step.kind,
            label: self.step.label.clone(),
            endpoint: self.endpoint.clone(),
            succeeded: verdict == AttemptVerdict::Success,
            verdict,
            http_status: None,
            raw_body_excerpt: String::new(),
            classification: None,
            session_token: None,
            session_cookie: None,
            error: None,
        }
    }

    fn network_failure(&self, err: &reqwest::Error) -> ProbeOutcome {
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        let mut outcome = self.outcome(AttemptVerdict::NetworkError);
        outcome.error = Some(format!("{}: {}", kind, err));
        outcome
    }
}

/// Normaliza a URL base: remove espaços e barras finais, assume `http://`
/// quando não há esquema.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProvedorError::InvalidBaseUrl("empty base URL".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let parsed = url::Url::parse(&with_scheme)
        .map_err(|e| ProvedorError::InvalidBaseUrl(format!("{}: {}", trimmed, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ProvedorError::InvalidBaseUrl(format!(
            "unsupported scheme '{}'",
            parsed.scheme()
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ProvedorError::InvalidBaseUrl(format!("{}: missing host", trimmed)));
    }

    Ok(with_scheme.trim_end_matches('/').to_string())
}

fn join_url(base: &str, endpoint: &str) -> String {
    if endpoint.starts_with('/') {
        format!("{}{}", base, endpoint)
    } else {
        format!("{}/{}", base, endpoint)
    }
}

/// Trecho do corpo truncado sem cortar caractere UTF-8
pub fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.len() <= EXCERPT_MAX_BYTES {
        return body.to_string();
    }
    let mut end = EXCERPT_MAX_BYTES;
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Resposta já lida (status, headers relevantes, corpo)
struct ReadResponse {
    status: u16,
    content_type: Option<String>,
    location: Option<String>,
    body: String,
}

async fn read_response(response: Response, jar: &mut CookieJar) -> std::result::Result<ReadResponse, reqwest::Error> {
    let status = response.status().as_u16();
    let headers = response.headers();
    jar.absorb(headers);
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let location = headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await?;

    Ok(ReadResponse {
        status,
        content_type,
        location,
        body,
    })
}

/// Cliente que executa estratégias de teste
#[derive(Clone)]
pub struct ProviderProber {
    http_client: HttpClient,
}

impl ProviderProber {
    /// Cria um prober com timeouts padrão
    ///
    /// # Timeouts
    ///
    /// - Total: 15s
    /// - Connect: 5s
    pub fn new() -> Result<Self> {
        Self::with_timeouts(15, 5)
    }

    /// Cria um prober com timeouts customizados
    ///
    /// Redirecionamentos NÃO são seguidos: o 302 do login é o próprio sinal.
    pub fn with_timeouts(total_timeout_secs: u64, connect_timeout_secs: u64) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(total_timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .redirect(redirect::Policy::none())
            .user_agent(concat!("gestor-provedores/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProvedorError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    /// Atalho: busca a estratégia no registro e executa
    pub async fn probe_provider(
        &self,
        registry: &Registry,
        provider_id: &str,
        base_url: &str,
        credentials: &Credentials,
    ) -> Result<ProbeReport> {
        let strategy = registry.strategy_for(provider_id);
        let provider = registry.provider(provider_id);
        self.probe(base_url, credentials, strategy, provider).await
    }

    /// Executa a estratégia e devolve o veredito com a trilha de diagnóstico
    pub async fn probe(
        &self,
        base_url: &str,
        credentials: &Credentials,
        strategy: &TestStrategy,
        provider: Option<&ProviderConfig>,
    ) -> Result<ProbeReport> {
        strategy.validate()?;
        let base = normalize_base_url(base_url)?;

        tracing::info!(
            "🔎 Testando credenciais em {} ({} passos, usuário: {})",
            base,
            strategy.steps.len(),
            credentials.username
        );

        let mut attempts = Vec::new();

        for (step_index, step) in strategy.steps.iter().enumerate() {
            tracing::debug!("▶️ Passo {} [{}] {}", step_index, step.kind, step.label);

            if let Some(winner) = self
                .run_step(step_index, step, &base, credentials, provider, &mut attempts)
                .await
            {
                tracing::info!(
                    "✅ Login validado em {} via '{}' ({})",
                    base,
                    winner.label,
                    winner.endpoint
                );
                return Ok(ProbeReport {
                    success: true,
                    base_url: base,
                    message: format!(
                        "Login validado via '{}' em {}",
                        winner.label, winner.endpoint
                    ),
                    winning_step: Some(winner),
                    attempts,
                });
            }
        }

        tracing::warn!(
            "❌ Nenhuma estratégia autenticou em {} ({} tentativas)",
            base,
            attempts.len()
        );

        Ok(ProbeReport {
            success: false,
            message: format!(
                "Nenhuma estratégia autenticou após {} tentativas",
                attempts.len()
            ),
            base_url: base,
            winning_step: None,
            attempts,
        })
    }

    /// Executa um passo; devolve a tentativa vencedora, se houver
    async fn run_step(
        &self,
        step_index: usize,
        step: &TestStep,
        base: &str,
        credentials: &Credentials,
        provider: Option<&ProviderConfig>,
        attempts: &mut Vec<ProbeOutcome>,
    ) -> Option<ProbeOutcome> {
        for endpoint in step.effective_endpoints() {
            let attempt = Attempt {
                step_index,
                step,
                url: join_url(base, &endpoint),
                endpoint,
            };

            let outcome = match step.kind {
                StepKind::Xtream => self.try_xtream(&attempt, credentials).await,
                StepKind::Form => self.try_form(&attempt, credentials, provider).await,
                StepKind::JsonPost => self.try_json_post(&attempt, credentials, provider).await,
            };

            tracing::debug!(
                "   {} {} -> {:?} (status {:?})",
                step.kind,
                attempt.endpoint,
                outcome.verdict,
                outcome.http_status
            );

            let verdict = outcome.verdict;
            attempts.push(outcome);

            match verdict {
                AttemptVerdict::Success => return attempts.last().cloned(),
                v if v.ends_step() => return None,
                _ => continue,
            }
        }

        None
    }

    fn evaluate(
        &self,
        attempt: &Attempt<'_>,
        response: &ReadResponse,
        jar: &CookieJar,
    ) -> ProbeOutcome {
        let view = ResponseView {
            status: response.status,
            content_type: response.content_type.as_deref(),
            location: response.location.as_deref(),
            body: &response.body,
        };
        let class = classify(&view, attempt.step.success_marker.as_ref());
        let verdict = verdict_for(attempt.step.kind, response.status, &class);

        let mut outcome = attempt.outcome(verdict);
        outcome.http_status = Some(response.status);
        outcome.raw_body_excerpt = excerpt(&response.body);
        if let ResponseClass::JsonSuccess { token } = &class {
            outcome.session_token = token.clone();
        }
        if verdict == AttemptVerdict::Success {
            outcome.session_cookie = jar.header_value();
        }
        match &class {
            ResponseClass::JsonError { reason } | ResponseClass::HtmlLoginPage { reason } => {
                outcome.error = Some(reason.clone());
            }
            _ => {}
        }
        outcome.classification = Some(class);
        outcome
    }

    async fn try_xtream(&self, attempt: &Attempt<'_>, credentials: &Credentials) -> ProbeOutcome {
        let mut jar = CookieJar::new();
        let sent = self
            .http_client
            .get(&attempt.url)
            .query(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .header(ACCEPT, "application/json")
            .send()
            .await;

        let read = match sent {
            Ok(response) => read_response(response, &mut jar).await,
            Err(e) => Err(e),
        };

        match read {
            Ok(response) => self.evaluate(attempt, &response, &jar),
            Err(e) => attempt.network_failure(&e),
        }
    }

    async fn try_form(
        &self,
        attempt: &Attempt<'_>,
        credentials: &Credentials,
        provider: Option<&ProviderConfig>,
    ) -> ProbeOutcome {
        let mut jar = CookieJar::new();

        // 1. GET da página de login: CSRF + cookies de sessão
        let page = match self.http_client.get(&attempt.url).send().await {
            Ok(response) => read_response(response, &mut jar).await,
            Err(e) => Err(e),
        };
        let page = match page {
            Ok(page) => page,
            Err(e) => return attempt.network_failure(&e),
        };

        if page.status == 404 {
            let mut outcome = attempt.outcome(AttemptVerdict::NotFound);
            outcome.http_status = Some(404);
            outcome.raw_body_excerpt = excerpt(&page.body);
            return outcome;
        }
        if !(200..300).contains(&page.status) {
            let mut outcome = attempt.outcome(AttemptVerdict::Inconclusive);
            outcome.http_status = Some(page.status);
            outcome.raw_body_excerpt = excerpt(&page.body);
            outcome.error = Some(format!("login page returned HTTP {}", page.status));
            return outcome;
        }

        let csrf = extract_csrf_token(&page.body);
        if csrf.is_none() {
            tracing::debug!("   Nenhum token CSRF encontrado em {}", attempt.url);
        }

        // 2. POST form-urlencoded com credenciais + token, repassando cookies
        let payload = provider
            .map(|p| p.login_payload(&credentials.username, &credentials.password))
            .unwrap_or_else(|| default_payload(&credentials.username, &credentials.password));
        let mut pairs = payload_to_form_pairs(&payload);
        if let Some(token) = &csrf {
            pairs.push((token.field.clone(), token.value.clone()));
        }

        let mut request = self
            .http_client
            .post(&attempt.url)
            .header(REFERER, attempt.url.as_str())
            .form(&pairs);
        if let Some(cookie) = jar.header_value() {
            request = request.header(COOKIE, cookie);
        }
        if let Some(token) = &csrf {
            request = request.header("X-CSRF-TOKEN", token.value.as_str());
        }

        let submitted = match request.send().await {
            Ok(response) => read_response(response, &mut jar).await,
            Err(e) => Err(e),
        };

        match submitted {
            Ok(response) => self.evaluate(attempt, &response, &jar),
            Err(e) => attempt.network_failure(&e),
        }
    }

    async fn try_json_post(
        &self,
        attempt: &Attempt<'_>,
        credentials: &Credentials,
        provider: Option<&ProviderConfig>,
    ) -> ProbeOutcome {
        let mut jar = CookieJar::new();
        let payload = provider
            .map(|p| p.login_payload(&credentials.username, &credentials.password))
            .unwrap_or_else(|| default_payload(&credentials.username, &credentials.password));

        let sent = self
            .http_client
            .post(&attempt.url)
            .header(ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await;

        let read = match sent {
            Ok(response) => read_response(response, &mut jar).await,
            Err(e) => Err(e),
        };

        match read {
            Ok(response) => self.evaluate(attempt, &response, &jar),
            Err(e) => attempt.network_failure(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SuccessMarker;
    use httpmock::prelude::*;
    use serde_json::json;

    fn creds() -> Credentials {
        Credentials::new("joao", "s3nha")
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url(" https://painel.exemplo.com/// ").unwrap(),
            "https://painel.exemplo.com"
        );
        assert_eq!(
            normalize_base_url("painel.exemplo.com:8080/").unwrap(),
            "http://painel.exemplo.com:8080"
        );
        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("ftp://painel.exemplo.com").is_err());
    }

    #[test]
    fn test_excerpt_respects_char_boundary() {
        let body = "é".repeat(400);
        let cut = excerpt(&body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= EXCERPT_MAX_BYTES + 3);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let printed = format!("{:?}", creds());
        assert!(!printed.contains("s3nha"));
    }

    #[tokio::test]
    async fn test_mundogf_form_login_end_to_end() {
        let server = MockServer::start_async().await;

        let login_page = server
            .mock_async(|when, then| {
                when.method(GET).path("/login");
                then.status(200)
                    .header("content-type", "text/html; charset=UTF-8")
                    .header("set-cookie", "XSRF-TOKEN=x1; Path=/")
                    .body(
                        r#"<html><form method="POST" action="/login">
                        <input type="hidden" name="_token" value="tok123">
                        <input type="text" name="username">
                        <input type="password" name="password">
                        </form></html>"#,
                    );
            })
            .await;

        let login_post = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/login")
                    .header("cookie", "XSRF-TOKEN=x1")
                    .body_contains("_token=tok123")
                    .body_contains("username=joao");
                then.status(200)
                    .header("set-cookie", "laravel_session=sess1; Path=/; HttpOnly")
                    .body("<html><body>Bem-vindo ao painel</body></html>");
            })
            .await;

        let registry = Registry::builtin();
        let prober = ProviderProber::new().unwrap();
        let report = prober
            .probe_provider(&registry, "mundogf", &format!("{}/", server.base_url()), &creds())
            .await
            .unwrap();

        login_page.assert_hits_async(1).await;
        login_post.assert_hits_async(1).await;

        assert!(report.success, "report: {:?}", report);
        let winner = report.winning_step.unwrap();
        assert_eq!(winner.step_type, StepKind::Form);
        assert_eq!(winner.label, "MundoGF Form Login (Laravel)");
        assert_eq!(winner.http_status, Some(200));
        assert!(winner
            .session_cookie
            .unwrap()
            .contains("laravel_session=sess1"));
        assert_eq!(report.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_stops_at_first_successful_step() {
        let server = MockServer::start_async().await;

        let json_login = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/login");
                then.status(200).json_body(json!({"token": "abc"}));
            })
            .await;
        let xtream = server
            .mock_async(|when, then| {
                when.method(GET).path("/player_api.php");
                then.status(200).json_body(json!({"user_info": {"auth": 1}}));
            })
            .await;

        let strategy = TestStrategy::new(vec![
            TestStep::new(StepKind::JsonPost, "JSON").with_endpoints(["/api/login"]),
            TestStep::new(StepKind::Xtream, "Xtream").with_endpoints(["/player_api.php"]),
        ]);

        let report = ProviderProber::new()
            .unwrap()
            .probe(&server.base_url(), &creds(), &strategy, None)
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(
            report.winning_step.unwrap().session_token.as_deref(),
            Some("abc")
        );
        json_login.assert_hits_async(1).await;
        xtream.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_not_found_advances_endpoint_then_step() {
        let server = MockServer::start_async().await;

        let first = server
            .mock_async(|when, then| {
                when.method(GET).path("/p1");
                then.status(404);
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET).path("/p2");
                then.status(404);
            })
            .await;
        let json_login = server
            .mock_async(|when, then| {
                when.method(POST).path("/j1");
                then.status(404);
            })
            .await;
        let json_login_2 = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/j2")
                    .json_body(json!({"username": "joao", "password": "s3nha"}));
                then.status(201).json_body(json!({"user": {"id": 7}}));
            })
            .await;

        let strategy = TestStrategy::new(vec![
            TestStep::new(StepKind::Xtream, "Xtream").with_endpoints(["/p1", "/p2"]),
            TestStep::new(StepKind::JsonPost, "JSON").with_endpoints(["/j1", "/j2"]),
        ]);

        let report = ProviderProber::new()
            .unwrap()
            .probe(&server.base_url(), &creds(), &strategy, None)
            .await
            .unwrap();

        first.assert_hits_async(1).await;
        second.assert_hits_async(1).await;
        json_login.assert_hits_async(1).await;
        json_login_2.assert_hits_async(1).await;

        assert!(report.success);
        let trail: Vec<(usize, &str, AttemptVerdict)> = report
            .attempts
            .iter()
            .map(|a| (a.step_index, a.endpoint.as_str(), a.verdict))
            .collect();
        assert_eq!(
            trail,
            vec![
                (0, "/p1", AttemptVerdict::NotFound),
                (0, "/p2", AttemptVerdict::NotFound),
                (1, "/j1", AttemptVerdict::NotFound),
                (1, "/j2", AttemptVerdict::Success),
            ]
        );
    }

    #[tokio::test]
    async fn test_auth_failure_abandons_step_and_reports_exhaustion() {
        let server = MockServer::start_async().await;

        let rejected = server
            .mock_async(|when, then| {
                when.method(POST).path("/a");
                then.status(401).json_body(json!({"message": "Unauthenticated."}));
            })
            .await;
        let skipped = server
            .mock_async(|when, then| {
                when.method(POST).path("/b");
                then.status(200).json_body(json!({"token": "nunca"}));
            })
            .await;
        let xtream_denied = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/player_api.php")
                    .query_param("username", "joao")
                    .query_param("password", "s3nha");
                then.status(200).json_body(json!({"user_info": {"auth": 0}}));
            })
            .await;

        let strategy = TestStrategy::new(vec![
            TestStep::new(StepKind::JsonPost, "JSON").with_endpoints(["/a", "/b"]),
            TestStep::new(StepKind::Xtream, "Xtream").with_endpoints(["/player_api.php"]),
        ]);

        let report = ProviderProber::new()
            .unwrap()
            .probe(&server.base_url(), &creds(), &strategy, None)
            .await
            .unwrap();

        rejected.assert_hits_async(1).await;
        skipped.assert_hits_async(0).await;
        xtream_denied.assert_hits_async(1).await;

        assert!(!report.success);
        assert!(report.winning_step.is_none());
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[0].http_status, Some(401));
        assert_eq!(report.attempts[0].verdict, AttemptVerdict::AuthFailure);
        assert!(report.attempts[0].raw_body_excerpt.contains("Unauthenticated"));
        assert_eq!(report.attempts[1].verdict, AttemptVerdict::AuthFailure);
    }

    #[tokio::test]
    async fn test_inconclusive_html_tries_next_xtream_endpoint() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method(GET).path("/panel_api.php");
                then.status(200)
                    .header("content-type", "text/html")
                    .body("<html><body>Painel</body></html>");
            })
            .await;
        let api = server
            .mock_async(|when, then| {
                when.method(GET).path("/player_api.php");
                then.status(200)
                    .json_body(json!({"user_info": {"auth": 1, "status": "Active"}}));
            })
            .await;

        let strategy = TestStrategy::new(vec![TestStep::new(StepKind::Xtream, "Xtream")
            .with_endpoints(["/panel_api.php", "/player_api.php"])
            .with_success_marker(SuccessMarker::equals("user_info.auth", json!(1)))]);

        let report = ProviderProber::new()
            .unwrap()
            .probe(&server.base_url(), &creds(), &strategy, None)
            .await
            .unwrap();

        api.assert_hits_async(1).await;
        assert!(report.success);
        assert_eq!(report.attempts[0].verdict, AttemptVerdict::Inconclusive);
        assert_eq!(report.attempts[1].endpoint, "/player_api.php");
    }

    #[tokio::test]
    async fn test_network_failure_abandons_each_step() {
        // Porta 1: conexão recusada
        let report = ProviderProber::with_timeouts(5, 2)
            .unwrap()
            .probe("http://127.0.0.1:1", &creds(), &TestStrategy::universal(), None)
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.attempts.len(), 3);
        assert!(report
            .attempts
            .iter()
            .all(|a| a.verdict == AttemptVerdict::NetworkError && a.error.is_some()));
        let kinds: Vec<StepKind> = report.attempts.iter().map(|a| a.step_type).collect();
        assert_eq!(kinds, vec![StepKind::Xtream, StepKind::Form, StepKind::JsonPost]);
    }

    #[tokio::test]
    async fn test_malformed_strategy_is_a_hard_error() {
        let prober = ProviderProber::new().unwrap();
        let empty = TestStrategy::new(vec![]);
        assert!(matches!(
            prober.probe("http://localhost", &creds(), &empty, None).await,
            Err(ProvedorError::InvalidStrategy(_))
        ));
        assert!(matches!(
            prober
                .probe("   ", &creds(), &TestStrategy::universal(), None)
                .await,
            Err(ProvedorError::InvalidBaseUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_payload_builder_is_used() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/login")
                    .json_body(json!({"login": "joao", "senha": "s3nha"}));
                then.status(200).json_body(json!({"success": true, "token": "u1"}));
            })
            .await;

        let report = ProviderProber::new()
            .unwrap()
            .probe_provider(&Registry::builtin(), "uniplay", &server.base_url(), &creds())
            .await
            .unwrap();

        login.assert_hits_async(1).await;
        assert!(report.success);
    }
}
