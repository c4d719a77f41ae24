//! Registro de provedores e suas estratégias de teste
//!
//! Cada painel de revenda suportado tem um `ProviderConfig` (rótulos para a
//! UI, endpoint de login, formato do payload) e, opcionalmente, uma
//! `TestStrategy` própria. Provedor sem estratégia registrada usa a
//! estratégia universal; isso não é erro.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ProvedorError, Result};
use crate::strategy::{StepKind, SuccessMarker, TestStep, TestStrategy};

/// Construtor de payload de login específico do fornecedor
pub type PayloadBuilder = fn(&str, &str) -> Value;

/// Método HTTP do endpoint de login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoginMethod {
    Get,
    Post,
}

/// Configuração de um fornecedor de painel
#[derive(Clone, Serialize)]
pub struct ProviderConfig {
    pub id: String,
    pub display_name: String,
    pub description: String,
    /// Provedor com integração completa (renovação automática etc.)
    pub integrated: bool,
    pub username_label: String,
    pub password_label: String,
    pub username_placeholder: String,
    pub password_placeholder: String,
    pub login_endpoint: String,
    pub login_method: LoginMethod,
    #[serde(skip)]
    pub build_login_payload: Option<PayloadBuilder>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("integrated", &self.integrated)
            .field("login_endpoint", &self.login_endpoint)
            .field("login_method", &self.login_method)
            .field("custom_payload", &self.build_login_payload.is_some())
            .finish()
    }
}

impl ProviderConfig {
    fn new(id: &str, display_name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
            integrated: false,
            username_label: "Usuário".to_string(),
            password_label: "Senha".to_string(),
            username_placeholder: "seu usuário do painel".to_string(),
            password_placeholder: "sua senha do painel".to_string(),
            login_endpoint: "/login".to_string(),
            login_method: LoginMethod::Post,
            build_login_payload: None,
        }
    }

    /// Payload de login: o do fornecedor ou `{username, password}`
    pub fn login_payload(&self, username: &str, password: &str) -> Value {
        match self.build_login_payload {
            Some(build) => build(username, password),
            None => default_payload(username, password),
        }
    }
}

/// Formato padrão `{username, password}`
pub fn default_payload(username: &str, password: &str) -> Value {
    json!({ "username": username, "password": password })
}

fn sigma_payload(username: &str, password: &str) -> Value {
    json!({ "username": username, "password": password, "captcha": "" })
}

fn uniplay_payload(username: &str, password: &str) -> Value {
    json!({ "login": username, "senha": password })
}

#[derive(Clone)]
struct ProviderEntry {
    config: ProviderConfig,
    strategy: Option<TestStrategy>,
}

/// Arquivo YAML de overrides
///
/// ```yaml
/// strategies:
///   mundogf:
///     steps:
///       - type: form
///         endpoints: ["/login"]
///         label: "MundoGF Form Login (Laravel)"
/// ```
#[derive(Debug, Deserialize)]
struct OverridesFile {
    #[serde(default)]
    strategies: HashMap<String, TestStrategy>,
}

/// Registro somente-leitura de provedores
#[derive(Clone)]
pub struct Registry {
    providers: HashMap<String, ProviderEntry>,
    /// Ordem de exibição na UI
    order: Vec<String>,
    universal: TestStrategy,
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Registry {
    /// Registro vazio (apenas a estratégia universal)
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
            order: Vec::new(),
            universal: TestStrategy::universal(),
        }
    }

    /// Provedores embutidos
    pub fn builtin() -> Self {
        let mut registry = Self::empty();

        let mut mundogf = ProviderConfig::new(
            "mundogf",
            "MundoGF",
            "Painel MundoGF (Laravel, login por formulário com CSRF)",
        );
        mundogf.integrated = true;
        registry.register(
            mundogf,
            Some(TestStrategy::new(vec![TestStep::new(
                StepKind::Form,
                "MundoGF Form Login (Laravel)",
            )
            .with_endpoints(["/login"])])),
        );

        let mut koffice = ProviderConfig::new(
            "koffice",
            "KOffice",
            "Painel KOffice (formulário, com API JSON como alternativa)",
        );
        koffice.integrated = true;
        registry.register(
            koffice,
            Some(TestStrategy::new(vec![
                TestStep::new(StepKind::Form, "KOffice Form Login").with_endpoints(["/login"]),
                TestStep::new(StepKind::JsonPost, "KOffice API Login")
                    .with_endpoints(["/api/login"]),
            ])),
        );

        let mut sigma = ProviderConfig::new(
            "sigma",
            "Sigma",
            "Painel Sigma (API JSON com token)",
        );
        sigma.login_endpoint = "/api/auth/login".to_string();
        sigma.build_login_payload = Some(sigma_payload);
        registry.register(
            sigma,
            Some(TestStrategy::new(vec![TestStep::new(
                StepKind::JsonPost,
                "Sigma API Login",
            )
            .with_endpoints(["/api/auth/login"])
            .with_success_marker(SuccessMarker::field("token"))])),
        );

        let mut club = ProviderConfig::new(
            "club",
            "Club",
            "Servidor Club (API Xtream Codes)",
        );
        club.login_endpoint = "/player_api.php".to_string();
        club.login_method = LoginMethod::Get;
        club.username_placeholder = "usuário da linha".to_string();
        club.password_placeholder = "senha da linha".to_string();
        registry.register(
            club,
            Some(TestStrategy::new(vec![TestStep::new(
                StepKind::Xtream,
                "Club Xtream API",
            )
            .with_endpoints(["/player_api.php"])
            .with_success_marker(SuccessMarker::equals("user_info.auth", json!(1)))])),
        );

        let mut uniplay = ProviderConfig::new(
            "uniplay",
            "Uniplay",
            "Painel Uniplay (API JSON, campos login/senha)",
        );
        uniplay.login_endpoint = "/api/login".to_string();
        uniplay.username_label = "Login".to_string();
        uniplay.build_login_payload = Some(uniplay_payload);
        registry.register(
            uniplay,
            Some(TestStrategy::new(vec![TestStep::new(
                StepKind::JsonPost,
                "Uniplay API Login",
            )
            .with_endpoints(["/api/login"])])),
        );

        // Genérico: sem estratégia própria, cai na universal
        let generico = ProviderConfig::new(
            "generico",
            "Outro painel",
            "Painel desconhecido: tenta Xtream, formulário e JSON",
        );
        registry.register(generico, None);

        registry
    }

    /// Registra (ou substitui) um provedor
    pub fn register(&mut self, config: ProviderConfig, strategy: Option<TestStrategy>) {
        let id = config.id.clone();
        if !self.providers.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.providers.insert(id, ProviderEntry { config, strategy });
    }

    /// Estratégia do provedor, ou a universal quando não há entrada
    pub fn strategy_for(&self, provider_id: &str) -> &TestStrategy {
        self.providers
            .get(provider_id)
            .and_then(|entry| entry.strategy.as_ref())
            .unwrap_or(&self.universal)
    }

    /// Indica se o provedor tem estratégia própria
    pub fn has_custom_strategy(&self, provider_id: &str) -> bool {
        self.providers
            .get(provider_id)
            .map_or(false, |entry| entry.strategy.is_some())
    }

    pub fn provider(&self, provider_id: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider_id).map(|entry| &entry.config)
    }

    /// Provedores na ordem de registro
    pub fn providers(&self) -> Vec<&ProviderConfig> {
        self.order
            .iter()
            .filter_map(|id| self.provider(id))
            .collect()
    }

    pub fn universal(&self) -> &TestStrategy {
        &self.universal
    }

    /// Valida todas as estratégias registradas
    pub fn validate(&self) -> Result<()> {
        self.universal.validate()?;
        for id in &self.order {
            if let Some(strategy) = self.providers.get(id).and_then(|e| e.strategy.as_ref()) {
                strategy.validate().map_err(|e| {
                    ProvedorError::InvalidStrategy(format!("provider '{}': {}", id, e))
                })?;
            }
        }
        Ok(())
    }

    /// Aplica overrides de um YAML já lido
    ///
    /// Ids desconhecidos criam um provedor genérico com a estratégia dada.
    pub fn apply_overrides_yaml(&mut self, content: &str) -> Result<usize> {
        let file: OverridesFile = serde_yaml::from_str(content)?;
        let mut applied = 0;

        for (id, strategy) in file.strategies {
            strategy.validate().map_err(|e| {
                ProvedorError::InvalidStrategy(format!("override '{}': {}", id, e))
            })?;

            match self.providers.get_mut(&id) {
                Some(entry) => entry.strategy = Some(strategy),
                None => {
                    let config = ProviderConfig::new(&id, &id, "Provedor configurado via overrides");
                    self.register(config, Some(strategy));
                }
            }
            tracing::info!("🔧 Estratégia de teste sobrescrita para provedor '{}'", id);
            applied += 1;
        }

        Ok(applied)
    }

    /// Carrega overrides de arquivo YAML
    pub async fn load_overrides_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        tracing::info!("📂 Carregando overrides de estratégias de: {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        self.apply_overrides_yaml(&content)
    }
}
