use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Configuração do serviço.
///
/// Ordem de carga: `config/default`, `config/{RUN_MODE}`, variáveis
/// `GESTOR__SECAO__CAMPO`. Todo campo tem default: o serviço sobe sem arquivo.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub rate_limit: RateLimitSettings,
    pub probe_rate_limit: RateLimitSettings,
    pub provedores: ProvedoresSettings,
    pub whatsapp: WhatsAppSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            rate_limit: RateLimitSettings::default(),
            probe_rate_limit: RateLimitSettings::probe_default(),
            provedores: ProvedoresSettings::default(),
            whatsapp: WhatsAppSettings::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Lê o IP do cliente de `X-Forwarded-For` / `X-Real-IP`. Só com proxy
    /// reverso na frente; sem ele vale o endereço da conexão.
    pub trust_proxy: bool,
    /// API keys aceitas em `X-Api-Key` para identificar o cliente no rate limit
    pub api_keys: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            trust_proxy: false,
            api_keys: Vec::new(),
        }
    }
}

/// Janela fixa: `max_requests` por `window_ms`
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitSettings {
    pub window_ms: u64,
    pub max_requests: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 120,
        }
    }
}

impl RateLimitSettings {
    /// Limite mais restrito para o teste de credenciais (cada teste gera
    /// várias requisições contra o painel do fornecedor)
    pub fn probe_default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 10,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProvedoresSettings {
    /// YAML com estratégias que substituem as embutidas
    pub strategies_file: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ProvedoresSettings {
    fn default() -> Self {
        Self {
            strategies_file: None,
            timeout_secs: 15,
            connect_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WhatsAppProviderKind {
    #[default]
    Disabled,
    Evolution,
    Zapi,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WhatsAppSettings {
    pub provider: WhatsAppProviderKind,
    pub evolution_url: Option<String>,
    pub evolution_api_key: Option<String>,
    pub zapi_url: String,
    pub zapi_instance_id: Option<String>,
    pub zapi_token: Option<String>,
    pub zapi_client_token: Option<String>,
    pub qr_ttl_secs: u64,
    pub poll_interval_secs: u64,
    pub send_delay_ms: u64,
    pub history_capacity: usize,
    pub bulk_max_contacts: usize,
    pub instance_prefix: String,
    /// Máximo de tenants em memória
    pub max_tenants: usize,
    /// Diretório dos snapshots de sessão; sem ele, snapshots só em memória
    pub snapshot_dir: Option<String>,
}

impl Default for WhatsAppSettings {
    fn default() -> Self {
        Self {
            provider: WhatsAppProviderKind::Disabled,
            evolution_url: None,
            evolution_api_key: None,
            zapi_url: whatsapp::DEFAULT_ZAPI_URL.to_string(),
            zapi_instance_id: None,
            zapi_token: None,
            zapi_client_token: None,
            qr_ttl_secs: whatsapp::DEFAULT_QR_TTL.as_secs(),
            poll_interval_secs: 5,
            send_delay_ms: whatsapp::DEFAULT_SEND_DELAY.as_millis() as u64,
            history_capacity: whatsapp::DEFAULT_HISTORY_CAPACITY,
            bulk_max_contacts: 500,
            instance_prefix: "gestor".to_string(),
            max_tenants: 1000,
            snapshot_dir: None,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            // Arquivo de configuração base
            .add_source(File::with_name("config/default").required(false))
            // Arquivo específico do ambiente
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        // Nomes curtos usados no deploy
        if let Ok(url) = std::env::var("EVOLUTION_API_URL") {
            builder = builder.set_override("whatsapp.evolution_url", url)?;
        }
        if let Ok(key) = std::env::var("EVOLUTION_API_KEY") {
            builder = builder.set_override("whatsapp.evolution_api_key", key)?;
        }

        builder = builder.add_source(
            Environment::with_prefix("GESTOR")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.api_keys")
                .try_parsing(true),
        );

        Self::load(builder)
    }

    /// Aplica os defaults por chave, desserializa e valida
    fn load(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        // Limite parcial do teste de credenciais completa com os próprios
        // defaults, não com os do limite geral
        let credentials = RateLimitSettings::probe_default();
        let settings: Settings = builder
            .set_default("probe_rate_limit.window_ms", credentials.window_ms as i64)?
            .set_default(
                "probe_rate_limit.max_requests",
                i64::from(credentials.max_requests),
            )?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, limits) in [
            ("rate_limit", &self.rate_limit),
            ("probe_rate_limit", &self.probe_rate_limit),
        ] {
            if limits.max_requests == 0 || limits.window_ms == 0 {
                return Err(ConfigError::Message(format!(
                    "{}: window_ms e max_requests devem ser maiores que zero",
                    name
                )));
            }
        }
        if self.whatsapp.max_tenants == 0 {
            return Err(ConfigError::Message(
                "whatsapp.max_tenants deve ser maior que zero".to_string(),
            ));
        }
        Ok(())
    }
}
