//! Suporte ao login por formulário: extração de CSRF e repasse de cookies

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, SET_COOKIE};

/// Nomes de campos ocultos usados como token CSRF pelos frameworks comuns
/// (Laravel, Django, Rails, Express).
const CSRF_FIELD_NAMES: &[&str] = &[
    "_token",
    "csrf_token",
    "csrfmiddlewaretoken",
    "_csrf",
    "authenticity_token",
];

/// Nomes de meta tags com token CSRF
const CSRF_META_NAMES: &[&str] = &["csrf-token", "csrf_token", "_csrf"];

/// Campo usado no POST quando o token veio de meta tag (convenção Laravel)
const DEFAULT_CSRF_FIELD: &str = "_token";

static INPUT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<input\b[^>]*>").expect("valid input tag regex"));

static META_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid meta tag regex"));

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});

/// Token CSRF encontrado na página de login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken {
    /// Nome do campo a ser enviado no POST
    pub field: String,
    pub value: String,
}

fn attributes(tag: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(tag)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Extrai o token CSRF de um campo oculto ou de uma meta tag.
///
/// Campo de formulário tem precedência sobre meta tag.
pub fn extract_csrf_token(html: &str) -> Option<CsrfToken> {
    for tag in INPUT_TAG.find_iter(html) {
        let attrs = attributes(tag.as_str());
        let Some(name) = attr(&attrs, "name") else {
            continue;
        };
        if CSRF_FIELD_NAMES.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            if let Some(value) = attr(&attrs, "value").filter(|v| !v.is_empty()) {
                return Some(CsrfToken {
                    field: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
    }

    for tag in META_TAG.find_iter(html) {
        let attrs = attributes(tag.as_str());
        let is_csrf = attr(&attrs, "name")
            .map_or(false, |name| CSRF_META_NAMES.iter().any(|n| n.eq_ignore_ascii_case(name)));
        if is_csrf {
            if let Some(content) = attr(&attrs, "content").filter(|c| !c.is_empty()) {
                return Some(CsrfToken {
                    field: DEFAULT_CSRF_FIELD.to_string(),
                    value: content.to_string(),
                });
            }
        }
    }

    None
}

/// Cookies capturados ao longo de um passo de formulário
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorve todos os `Set-Cookie` de uma resposta
    pub fn absorb(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(raw) = value.to_str() {
                self.insert_raw(raw);
            }
        }
    }

    /// Interpreta um valor de `Set-Cookie` (`nome=valor; Path=/; ...`)
    pub fn insert_raw(&mut self, raw: &str) {
        let pair = raw.split(';').next().unwrap_or_default().trim();
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        match self.cookies.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value.trim().to_string(),
            None => self
                .cookies
                .push((name.to_string(), value.trim().to_string())),
        }
    }

    /// Valor do header `Cookie`
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Converte um payload JSON plano em pares form-urlencoded
pub fn payload_to_form_pairs(payload: &serde_json::Value) -> Vec<(String, String)> {
    let Some(object) = payload.as_object() else {
        return Vec::new();
    };
    object
        .iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}
