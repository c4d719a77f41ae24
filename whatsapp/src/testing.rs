//! Fornecedor falso para testes do gerenciador e do disparo

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, WhatsAppError};
use crate::provider::{ConnectionInfo, CreatedSession, WhatsAppProvider};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Failure {
    Vendor,
    Transport,
}

#[derive(Default)]
pub(crate) struct MockProvider {
    pub creates: AtomicUsize,
    pub qr_refreshes: AtomicUsize,
    pub status_checks: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub deletes: AtomicUsize,
    pub connected: AtomicBool,
    create_failure: Mutex<Option<Failure>>,
    qr_failure: Mutex<Option<Failure>>,
    status_failure: Mutex<Option<Failure>>,
    failing_phones: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl MockProvider {
    pub fn fail_create_with(&self, failure: Failure) {
        *self.create_failure.lock().unwrap() = Some(failure);
    }

    pub fn clear_create_failure(&self) {
        *self.create_failure.lock().unwrap() = None;
    }

    pub fn fail_qr_with(&self, failure: Failure) {
        *self.qr_failure.lock().unwrap() = Some(failure);
    }

    pub fn clear_qr_failure(&self) {
        *self.qr_failure.lock().unwrap() = None;
    }

    pub fn fail_status_with(&self, failure: Failure) {
        *self.status_failure.lock().unwrap() = Some(failure);
    }

    pub fn clear_status_failure(&self) {
        *self.status_failure.lock().unwrap() = None;
    }

    pub fn fail_sends_to(&self, phone: &str) {
        self.failing_phones.lock().unwrap().push(phone.to_string());
    }

    pub fn sent_phones(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(phone, _)| phone.clone())
            .collect()
    }
}

async fn injected(slot: &Mutex<Option<Failure>>) -> Result<()> {
    let failure = *slot.lock().unwrap();
    match failure {
        Some(Failure::Vendor) => Err(WhatsAppError::Provider {
            status: 404,
            message: "instance does not exist".to_string(),
        }),
        Some(Failure::Transport) => Err(transport_error().await),
        None => Ok(()),
    }
}

/// Erro do reqwest sem I/O (URL sem host): resolve na hora, inclusive com
/// o relógio pausado
pub(crate) async fn transport_error() -> WhatsAppError {
    match reqwest::Client::new().get("http://").send().await {
        Err(e) => WhatsAppError::Http(e),
        Ok(_) => panic!("request without host unexpectedly succeeded"),
    }
}

/// Deixa tarefas recém-acordadas rodarem
pub(crate) async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[async_trait]
impl WhatsAppProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_session(&self, instance_name: &str) -> Result<CreatedSession> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        injected(&self.create_failure).await?;
        Ok(CreatedSession {
            session_id: instance_name.to_string(),
            qr_code: Some("qr-0".to_string()),
        })
    }

    async fn refresh_qr(&self, _session_id: &str) -> Result<Option<String>> {
        let n = self.qr_refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        injected(&self.qr_failure).await?;
        Ok(Some(format!("qr-{}", n)))
    }

    async fn connection_status(&self, _session_id: &str) -> Result<ConnectionInfo> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        injected(&self.status_failure).await?;
        if !self.connected.load(Ordering::SeqCst) {
            return Ok(ConnectionInfo::default());
        }
        Ok(ConnectionInfo {
            connected: true,
            phone_number: Some("5511999998888".to_string()),
            profile_name: Some("Loja Teste".to_string()),
        })
    }

    async fn send_text(&self, _session_id: &str, phone: &str, message: &str) -> Result<String> {
        let failing = self.failing_phones.lock().unwrap().iter().any(|p| p == phone);
        if failing {
            return Err(WhatsAppError::Provider {
                status: 400,
                message: format!("number {} is not on WhatsApp", phone),
            });
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((phone.to_string(), message.to_string()));
        Ok(format!("msg-{}", sent.len()))
    }

    async fn disconnect(&self, _session_id: &str) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_session(&self, _session_id: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
