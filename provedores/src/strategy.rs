//! Estratégias de teste de login
//!
//! Uma `TestStrategy` é a lista ordenada de passos que o prober executa contra
//! um painel desconhecido. A ordem é conhecimento empírico do fornecedor e
//! nunca é reordenada.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProvedorError, Result};

/// Endpoints conhecidos para descoberta estilo Xtream
pub const DEFAULT_XTREAM_ENDPOINTS: &[&str] =
    &["/player_api.php", "/panel_api.php", "/api/player_api.php"];

/// Endpoints conhecidos para login por formulário HTML
pub const DEFAULT_FORM_ENDPOINTS: &[&str] = &["/login", "/admin/login", "/auth/login"];

/// Endpoints conhecidos para login via JSON POST
pub const DEFAULT_JSON_POST_ENDPOINTS: &[&str] =
    &["/api/login", "/api/auth/login", "/auth/login", "/login"];

/// Tipo de passo de autenticação
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    /// GET com usuário/senha na query string
    Xtream,
    /// GET da página de login + POST form-urlencoded com CSRF
    Form,
    /// POST com corpo JSON
    JsonPost,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Xtream => "xtream",
            StepKind::Form => "form",
            StepKind::JsonPost => "json-post",
        }
    }

    /// Lista fixa de endpoints usada quando o passo não declara a sua
    pub fn default_endpoints(&self) -> &'static [&'static str] {
        match self {
            StepKind::Xtream => DEFAULT_XTREAM_ENDPOINTS,
            StepKind::Form => DEFAULT_FORM_ENDPOINTS,
            StepKind::JsonPost => DEFAULT_JSON_POST_ENDPOINTS,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Critério explícito de sucesso para respostas JSON.
///
/// `field` é um caminho com pontos (`user_info.auth`). Sem `equals`, basta o
/// campo existir e não ser nulo/falso/vazio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessMarker {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
}

impl SuccessMarker {
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            equals: None,
        }
    }

    pub fn equals(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            equals: Some(value),
        }
    }

    /// Verifica o marcador contra um corpo JSON já parseado
    pub fn matches(&self, body: &Value) -> bool {
        let found = self
            .field
            .split('.')
            .try_fold(body, |current, segment| current.get(segment));

        match (found, &self.equals) {
            (None, _) => false,
            (Some(value), Some(expected)) => loose_eq(value, expected),
            (Some(value), None) => is_truthy(value),
        }
    }
}

/// Comparação tolerante: painéis devolvem `1`, `"1"` ou `true` para o mesmo fato
fn loose_eq(value: &Value, expected: &Value) -> bool {
    if value == expected {
        return true;
    }
    match (value, expected) {
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.trim() == n.to_string()
        }
        (Value::Bool(b), Value::Number(n)) | (Value::Number(n), Value::Bool(b)) => {
            n.as_i64() == Some(i64::from(*b))
        }
        _ => false,
    }
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Um passo da estratégia
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStep {
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<String>>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_marker: Option<SuccessMarker>,
}

impl TestStep {
    pub fn new(kind: StepKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            endpoints: None,
            label: label.into(),
            success_marker: None,
        }
    }

    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = Some(endpoints.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_success_marker(mut self, marker: SuccessMarker) -> Self {
        self.success_marker = Some(marker);
        self
    }

    /// Endpoints efetivos: os declarados ou a lista padrão do tipo
    pub fn effective_endpoints(&self) -> Vec<String> {
        match &self.endpoints {
            Some(endpoints) => endpoints.clone(),
            None => self
                .kind
                .default_endpoints()
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

/// Sequência ordenada de passos, imutável depois de construída
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStrategy {
    pub steps: Vec<TestStep>,
}

impl TestStrategy {
    pub fn new(steps: Vec<TestStep>) -> Self {
        Self { steps }
    }

    /// Estratégia universal: Xtream, formulário e JSON POST, nessa ordem,
    /// cada um contra a lista fixa de endpoints conhecidos.
    pub fn universal() -> Self {
        Self::new(vec![
            TestStep::new(StepKind::Xtream, "Xtream API Discovery"),
            TestStep::new(StepKind::Form, "HTML Form Login"),
            TestStep::new(StepKind::JsonPost, "JSON POST Login"),
        ])
    }

    /// Rejeita estratégias malformadas antes de qualquer chamada de rede
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(ProvedorError::InvalidStrategy(
                "strategy has no steps".to_string(),
            ));
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.label.trim().is_empty() {
                return Err(ProvedorError::InvalidStrategy(format!(
                    "step {} has an empty label",
                    index
                )));
            }
            if let Some(endpoints) = &step.endpoints {
                if endpoints.is_empty() {
                    return Err(ProvedorError::InvalidStrategy(format!(
                        "step {} ('{}') declares an empty endpoint list",
                        index, step.label
                    )));
                }
                if let Some(bad) = endpoints.iter().find(|e| e.trim().is_empty()) {
                    return Err(ProvedorError::InvalidStrategy(format!(
                        "step {} ('{}') has a blank endpoint: {:?}",
                        index, step.label, bad
                    )));
                }
            }
        }

        Ok(())
    }
}
