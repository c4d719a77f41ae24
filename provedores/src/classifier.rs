//! Classificador de respostas heterogêneas dos painéis
//!
//! Os painéis respondem JSON, HTML ou texto puro sem esquema fixo. Toda a
//! interpretação fica aqui, em duas etapas:
//! 1. `classify` reduz a resposta a um `ResponseClass`
//! 2. `verdict_for` combina tipo de passo + status HTTP + classe em um
//!    `AttemptVerdict` que dirige a iteração do prober

use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::strategy::{is_truthy, StepKind, SuccessMarker};

/// Marcadores de falha de login (comparados em minúsculas)
const LOGIN_FAILURE_MARKERS: &[&str] = &[
    "invalid credentials",
    "these credentials do not match",
    "incorrect password",
    "invalid password",
    "invalid username",
    "wrong password",
    "login failed",
    "authentication failed",
    "credenciais inválidas",
    "credenciais invalidas",
    "senha incorreta",
    "senha inválida",
    "senha invalida",
    "usuário ou senha inválid",
    "usuario ou senha invalid",
    "usuário ou senha incorret",
    "usuario ou senha incorret",
    "falha no login",
    "acesso negado",
];

/// Trechos de URL que indicam redirecionamento de volta ao login
const LOGIN_PATH_MARKERS: &[&str] = &["/login", "/signin", "/sign-in", "error=", "erro="];

/// Campos JSON onde painéis costumam devolver o token de sessão
const TOKEN_FIELDS: &[&str] = &[
    "token",
    "access_token",
    "accessToken",
    "jwt",
    "data.token",
    "data.access_token",
    "data.accessToken",
];

static FAILURE_MATCHER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new(LOGIN_FAILURE_MARKERS).expect("valid login failure markers")
});

static PASSWORD_INPUT: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::new([
        "type=\"password\"",
        "type='password'",
        "type=password",
    ])
    .expect("valid password input patterns")
});

/// Forma normalizada de uma resposta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResponseClass {
    /// JSON sem marcador de erro (ou que satisfaz o marcador de sucesso)
    JsonSuccess { token: Option<String> },
    /// JSON com campo de erro explícito / falha de autenticação
    JsonError { reason: String },
    /// Redirecionamento para fora do login ou página autenticada
    HtmlRedirectSuccess { location: Option<String> },
    /// Página de login de novo, ou mensagem de falha de login
    HtmlLoginPage { reason: String },
    /// Nada reconhecível (corpo vazio, texto arbitrário)
    Unrecognized,
}

/// Resultado de uma tentativa contra um endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptVerdict {
    /// Conclusivo: credenciais aceitas
    Success,
    /// Conclusivo: credenciais recusadas; abandona o tipo de passo
    AuthFailure,
    /// 404: tenta o próximo endpoint do mesmo passo
    NotFound,
    /// Timeout, DNS, conexão recusada: abandona o tipo de passo
    NetworkError,
    /// Alcançável mas sem resultado conclusivo: tenta o próximo endpoint
    Inconclusive,
}

impl AttemptVerdict {
    /// Resultado conclusivo encerra a iteração de endpoints do passo
    pub fn ends_step(&self) -> bool {
        matches!(
            self,
            AttemptVerdict::Success | AttemptVerdict::AuthFailure | AttemptVerdict::NetworkError
        )
    }
}

/// Dados mínimos de uma resposta HTTP para classificação
#[derive(Debug, Clone, Copy)]
pub struct ResponseView<'a> {
    pub status: u16,
    pub content_type: Option<&'a str>,
    pub location: Option<&'a str>,
    pub body: &'a str,
}

fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

fn parse_json(view: &ResponseView<'_>) -> Option<Value> {
    let trimmed = view.body.trim_start();
    let declared_json = view
        .content_type
        .map_or(false, |ct| ct.to_ascii_lowercase().contains("json"));
    if declared_json || trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(trimmed).ok()
    } else {
        None
    }
}

fn looks_like_html(view: &ResponseView<'_>) -> bool {
    if view
        .content_type
        .map_or(false, |ct| ct.to_ascii_lowercase().contains("html"))
    {
        return true;
    }
    let head = view.body.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html") || head.contains("<form")
}

/// Primeiro marcador de falha de login encontrado no texto
pub fn find_login_failure_marker(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    FAILURE_MATCHER
        .find(&lowered)
        .map(|m| LOGIN_FAILURE_MARKERS[m.pattern().as_usize()])
}

fn has_password_input(html: &str) -> bool {
    PASSWORD_INPUT.is_match(&html.to_ascii_lowercase())
}

fn location_points_to_login(location: &str) -> bool {
    let lowered = location.to_ascii_lowercase();
    LOGIN_PATH_MARKERS.iter().any(|m| lowered.contains(m))
}

fn lookup<'v>(body: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(body, |current, segment| current.get(segment))
}

/// Motivo de erro explícito em um corpo JSON, se houver
pub fn json_error_reason(body: &Value) -> Option<String> {
    let message = || {
        ["message", "msg", "mensagem", "error_description"]
            .iter()
            .find_map(|k| body.get(*k).and_then(Value::as_str))
            .map(str::to_string)
    };

    if let Some(error) = body.get("error").filter(|v| is_truthy(v)) {
        let text = match error {
            Value::String(s) => s.clone(),
            Value::Bool(_) => message().unwrap_or_else(|| "error=true".to_string()),
            other => other.to_string(),
        };
        return Some(text);
    }

    if let Some(errors) = body.get("errors").filter(|v| is_truthy(v)) {
        return Some(message().unwrap_or_else(|| errors.to_string()));
    }

    for flag in ["success", "ok", "status", "result"] {
        match body.get(flag) {
            Some(Value::Bool(false)) => {
                return Some(message().unwrap_or_else(|| format!("{}=false", flag)));
            }
            Some(Value::String(s))
                if matches!(
                    s.to_ascii_lowercase().as_str(),
                    "error" | "erro" | "fail" | "failed" | "falha"
                ) =>
            {
                return Some(message().unwrap_or_else(|| format!("{}={}", flag, s)));
            }
            _ => {}
        }
    }

    // Xtream Codes: user_info.auth = 0 indica credencial recusada
    if let Some(auth) = lookup(body, "user_info.auth") {
        if !is_truthy(auth) || auth.as_str() == Some("0") {
            return Some("xtream user_info.auth=0".to_string());
        }
    }

    None
}

/// Token de sessão devolvido no corpo JSON, se houver
pub fn extract_token(body: &Value) -> Option<String> {
    TOKEN_FIELDS
        .iter()
        .find_map(|path| lookup(body, path).and_then(Value::as_str))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Classifica uma resposta de forma independente do tipo de passo
pub fn classify(view: &ResponseView<'_>, marker: Option<&SuccessMarker>) -> ResponseClass {
    if let Some(json) = parse_json(view) {
        if let Some(marker) = marker {
            return if marker.matches(&json) {
                ResponseClass::JsonSuccess {
                    token: extract_token(&json),
                }
            } else {
                ResponseClass::JsonError {
                    reason: json_error_reason(&json).unwrap_or_else(|| {
                        format!("success marker '{}' not satisfied", marker.field)
                    }),
                }
            };
        }

        return match json_error_reason(&json) {
            Some(reason) => ResponseClass::JsonError { reason },
            None => ResponseClass::JsonSuccess {
                token: extract_token(&json),
            },
        };
    }

    if is_redirect(view.status) {
        return match view.location {
            Some(location) if location_points_to_login(location) => ResponseClass::HtmlLoginPage {
                reason: format!("redirected back to login: {}", location),
            },
            location => ResponseClass::HtmlRedirectSuccess {
                location: location.map(str::to_string),
            },
        };
    }

    if let Some(marker) = find_login_failure_marker(view.body) {
        return ResponseClass::HtmlLoginPage {
            reason: format!("login failure marker: '{}'", marker),
        };
    }

    if looks_like_html(view) {
        if has_password_input(view.body) {
            return ResponseClass::HtmlLoginPage {
                reason: "login form still present".to_string(),
            };
        }
        return ResponseClass::HtmlRedirectSuccess { location: None };
    }

    ResponseClass::Unrecognized
}

/// Decide o veredito de uma tentativa
pub fn verdict_for(kind: StepKind, status: u16, class: &ResponseClass) -> AttemptVerdict {
    match status {
        404 => return AttemptVerdict::NotFound,
        401 | 403 => return AttemptVerdict::AuthFailure,
        _ => {}
    }

    match kind {
        StepKind::Form => {
            if status == 200 || is_redirect(status) {
                match class {
                    ResponseClass::HtmlLoginPage { .. } | ResponseClass::JsonError { .. } => {
                        AttemptVerdict::AuthFailure
                    }
                    _ => AttemptVerdict::Success,
                }
            } else if status == 422 && matches!(class, ResponseClass::JsonError { .. }) {
                AttemptVerdict::AuthFailure
            } else {
                AttemptVerdict::Inconclusive
            }
        }
        StepKind::Xtream | StepKind::JsonPost => {
            let accepted = match kind {
                StepKind::Xtream => status == 200,
                _ => status == 200 || status == 201,
            };
            match class {
                ResponseClass::JsonSuccess { .. } if accepted => AttemptVerdict::Success,
                ResponseClass::JsonError { .. } if accepted || status == 400 || status == 422 => {
                    AttemptVerdict::AuthFailure
                }
                _ => AttemptVerdict::Inconclusive,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view<'a>(status: u16, content_type: Option<&'a str>, body: &'a str) -> ResponseView<'a> {
        ResponseView {
            status,
            content_type,
            location: None,
            body,
        }
    }

    #[test]
    fn test_json_success_with_token() {
        let class = classify(
            &view(200, Some("application/json"), r#"{"data": {"token": "jwt-1"}}"#),
            None,
        );
        assert_eq!(
            class,
            ResponseClass::JsonSuccess {
                token: Some("jwt-1".to_string())
            }
        );
    }

    #[test]
    fn test_json_explicit_errors() {
        for body in [
            r#"{"error": "Unauthorized"}"#,
            r#"{"success": false, "message": "Credenciais inválidas"}"#,
            r#"{"status": "error"}"#,
            r#"{"errors": {"username": ["invalid"]}}"#,
            r#"{"user_info": {"auth": 0}}"#,
        ] {
            let class = classify(&view(200, None, body), None);
            assert!(
                matches!(class, ResponseClass::JsonError { .. }),
                "body {} should be an error, got {:?}",
                body,
                class
            );
        }
    }

    #[test]
    fn test_json_with_null_error_is_success() {
        let class = classify(&view(200, None, r#"{"error": null, "user": "x"}"#), None);
        assert!(matches!(class, ResponseClass::JsonSuccess { .. }));
    }

    #[test]
    fn test_success_marker_overrides_heuristic() {
        let marker = SuccessMarker::field("token");
        let class = classify(&view(200, None, r#"{"user": "x"}"#), Some(&marker));
        assert!(matches!(class, ResponseClass::JsonError { .. }));
    }

    #[test]
    fn test_redirect_classification() {
        let mut v = view(302, Some("text/html"), "");
        v.location = Some("https://painel.exemplo/dashboard");
        assert!(matches!(
            classify(&v, None),
            ResponseClass::HtmlRedirectSuccess { .. }
        ));

        v.location = Some("/login?error=1");
        assert!(matches!(classify(&v, None), ResponseClass::HtmlLoginPage { .. }));
    }

    #[test]
    fn test_html_login_page_detection() {
        let page = r#"<!DOCTYPE html><html><form><input type="password" name="password"></form></html>"#;
        assert!(matches!(
            classify(&view(200, Some("text/html"), page), None),
            ResponseClass::HtmlLoginPage { .. }
        ));

        let failed = "<html><div class=\"alert\">Usuário ou senha inválidos</div></html>";
        assert!(matches!(
            classify(&view(200, Some("text/html"), failed), None),
            ResponseClass::HtmlLoginPage { .. }
        ));

        let dashboard = "<html><body><h1>Painel</h1></body></html>";
        assert!(matches!(
            classify(&view(200, Some("text/html"), dashboard), None),
            ResponseClass::HtmlRedirectSuccess { .. }
        ));
    }

    #[test]
    fn test_unrecognized_plain_text() {
        assert_eq!(classify(&view(200, None, ""), None), ResponseClass::Unrecognized);
        assert_eq!(classify(&view(200, None, "ok"), None), ResponseClass::Unrecognized);
    }

    #[test]
    fn test_verdicts() {
        let ok = ResponseClass::JsonSuccess { token: None };
        let err = ResponseClass::JsonError {
            reason: "x".to_string(),
        };
        let html_ok = ResponseClass::HtmlRedirectSuccess { location: None };

        assert_eq!(verdict_for(StepKind::Xtream, 404, &ok), AttemptVerdict::NotFound);
        assert_eq!(verdict_for(StepKind::Xtream, 200, &ok), AttemptVerdict::Success);
        assert_eq!(verdict_for(StepKind::Xtream, 200, &err), AttemptVerdict::AuthFailure);
        assert_eq!(verdict_for(StepKind::Xtream, 200, &html_ok), AttemptVerdict::Inconclusive);
        assert_eq!(verdict_for(StepKind::JsonPost, 201, &ok), AttemptVerdict::Success);
        assert_eq!(verdict_for(StepKind::JsonPost, 500, &ok), AttemptVerdict::Inconclusive);
        assert_eq!(verdict_for(StepKind::JsonPost, 401, &ok), AttemptVerdict::AuthFailure);
        assert_eq!(verdict_for(StepKind::Form, 302, &html_ok), AttemptVerdict::Success);
        assert_eq!(
            verdict_for(StepKind::Form, 200, &ResponseClass::Unrecognized),
            AttemptVerdict::Success
        );
        assert_eq!(
            verdict_for(StepKind::Form, 419, &ResponseClass::Unrecognized),
            AttemptVerdict::Inconclusive
        );
    }

    #[test]
    fn test_extract_token_variants() {
        assert_eq!(extract_token(&json!({"access_token": "a"})).as_deref(), Some("a"));
        assert_eq!(extract_token(&json!({"token": ""})), None);
        assert_eq!(extract_token(&json!({"user": "x"})), None);
    }
}
