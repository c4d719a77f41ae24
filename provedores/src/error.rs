//! Tipos de erro para o crate provedores

use thiserror::Error;

/// Erros "duros" do motor de teste.
///
/// Falhas de rede, 404 e credenciais recusadas NÃO aparecem aqui: elas viram
/// dados no relatório de diagnóstico. Só configuração malformada ou entrada
/// inválida interrompe um teste.
#[derive(Debug, Error)]
pub enum ProvedorError {
    /// Estratégia sem passos ou com lista de endpoints vazia
    #[error("Invalid test strategy: {0}")]
    InvalidStrategy(String),

    /// URL base que não pode ser interpretada
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Falha ao montar o cliente HTTP
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Erro ao ler arquivo de overrides de estratégias
    #[error("Failed to read overrides file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML de overrides inválido
    #[error("Invalid overrides YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Tipo Result padrão para o crate
pub type Result<T> = std::result::Result<T, ProvedorError>;
