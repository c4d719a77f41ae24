//! Gerenciador de sessão WhatsApp
//!
//! Máquina de estados `disconnected -> connecting -> connected`, com `failed`
//! para erros do fornecedor. O QR tem validade (120s por padrão) e um
//! countdown renova o código automaticamente quando expira.
//!
//! Toda transição é espelhada no `SnapshotStore`, para que um restart possa
//! reidratar o último estado conhecido de forma otimista.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{Result, WhatsAppError};
use crate::provider::WhatsAppProvider;
use crate::scheduler::ScheduledTask;
use crate::storage::SnapshotStore;
use crate::types::{SessionSnapshot, SessionStatus, WhatsAppSession};

/// Validade implícita de um QR code
pub const DEFAULT_QR_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub qr_ttl: Duration,
    /// Prefixo do nome das instâncias criadas no fornecedor
    pub instance_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            qr_ttl: DEFAULT_QR_TTL,
            instance_prefix: "gestor".to_string(),
        }
    }
}

#[derive(Default)]
struct SessionState {
    session: WhatsAppSession,
    connected_at: Option<DateTime<Utc>>,
    disconnected_at: Option<DateTime<Utc>>,
    connect_in_flight: bool,
    qr_timer: Option<ScheduledTask>,
    /// Invalida countdowns antigos que já dispararam
    qr_generation: u64,
    poller: Option<ScheduledTask>,
}

impl SessionState {
    fn snapshot(&self) -> Option<SessionSnapshot> {
        let session_id = self.session.session_id.clone()?;
        Some(SessionSnapshot {
            session_id,
            status: self.session.status,
            qr_code: self.session.qr_code.clone(),
            timestamp: Utc::now(),
            connected_at: self.connected_at,
            disconnected_at: self.disconnected_at,
        })
    }

    fn stop_countdown(&mut self) {
        self.qr_timer = None;
        self.qr_generation += 1;
        self.session.qr_expires_at = None;
    }

    fn fail(&mut self, err: &WhatsAppError) {
        self.stop_countdown();
        self.session.status = SessionStatus::Failed;
        self.session.qr_code = None;
        self.session.error = Some(err.to_string());
    }

    fn clear(&mut self) {
        self.stop_countdown();
        self.session = WhatsAppSession::default();
        self.connected_at = None;
        self.disconnected_at = Some(Utc::now());
    }
}

struct Inner {
    key: String,
    provider: Arc<dyn WhatsAppProvider>,
    store: Arc<dyn SnapshotStore>,
    config: SessionConfig,
    state: Mutex<SessionState>,
}

/// Sessão de um tenant. Clones compartilham o mesmo estado.
///
/// O lock de estado nunca é mantido durante chamadas ao fornecedor.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        key: impl Into<String>,
        provider: Arc<dyn WhatsAppProvider>,
        store: Arc<dyn SnapshotStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                key: key.into(),
                provider,
                store,
                config,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub(crate) fn provider(&self) -> Arc<dyn WhatsAppProvider> {
        self.inner.provider.clone()
    }

    pub async fn session(&self) -> WhatsAppSession {
        self.inner.state.lock().await.session.clone()
    }

    /// Nada aberto no fornecedor nem conexão em andamento
    pub async fn is_idle(&self) -> bool {
        let st = self.inner.state.lock().await;
        !st.connect_in_flight && st.session.session_id.is_none()
    }

    /// Id da sessão, exigindo estado `connected`
    pub async fn connected_session_id(&self) -> Result<String> {
        let st = self.inner.state.lock().await;
        match (&st.session.status, &st.session.session_id) {
            (SessionStatus::Connected, Some(id)) => Ok(id.clone()),
            _ => Err(WhatsAppError::NotConnected),
        }
    }

    /// Restaura o último snapshot de forma otimista: o próximo poll confirma
    /// ou desmente o estado.
    pub async fn rehydrate(&self) -> Result<WhatsAppSession> {
        let snapshot = self.inner.store.load(&self.inner.key).await?;
        let mut st = self.inner.state.lock().await;

        let Some(snapshot) = snapshot else {
            return Ok(st.session.clone());
        };

        st.session = WhatsAppSession {
            session_id: Some(snapshot.session_id),
            status: snapshot.status,
            qr_code: snapshot.qr_code,
            ..WhatsAppSession::default()
        };
        st.connected_at = snapshot.connected_at;
        st.disconnected_at = snapshot.disconnected_at;

        if snapshot.status == SessionStatus::Connecting {
            let elapsed = (Utc::now() - snapshot.timestamp).to_std().unwrap_or_default();
            let remaining = self.inner.config.qr_ttl.saturating_sub(elapsed);
            self.arm_countdown(&mut st, remaining);
        }

        tracing::info!(
            "🔄 Sessão WhatsApp '{}' reidratada: {}",
            self.inner.key,
            st.session.status
        );
        Ok(st.session.clone())
    }

    /// `disconnected|failed -> connecting`: cria a sessão no fornecedor e
    /// inicia o countdown do QR. Em `connecting`/`connected` devolve o estado atual.
    ///
    /// Saindo de `failed`, a instância anterior é liberada no fornecedor antes
    /// de criar a nova.
    pub async fn connect(&self) -> Result<WhatsAppSession> {
        let previous = {
            let mut st = self.inner.state.lock().await;
            if st.connect_in_flight
                || matches!(
                    st.session.status,
                    SessionStatus::Connecting | SessionStatus::Connected
                )
            {
                return Ok(st.session.clone());
            }
            st.connect_in_flight = true;

            let previous = match st.session.status {
                SessionStatus::Failed => st.session.session_id.take(),
                _ => None,
            };
            if previous.is_some() {
                self.persist(&st).await;
            }
            previous
        };

        if let Some(old) = &previous {
            self.release(old).await;
        }

        let suffix = Uuid::new_v4().simple().to_string();
        let instance_name = format!("{}-{}", self.inner.config.instance_prefix, &suffix[..8]);
        let result = self.inner.provider.create_session(&instance_name).await;

        let mut st = self.inner.state.lock().await;
        st.connect_in_flight = false;

        match result {
            Ok(created) => {
                tracing::info!(
                    "📱 Sessão WhatsApp '{}' criada via {}: {}",
                    self.inner.key,
                    self.inner.provider.name(),
                    created.session_id
                );
                st.session = WhatsAppSession {
                    session_id: Some(created.session_id),
                    status: SessionStatus::Connecting,
                    qr_code: created.qr_code,
                    ..WhatsAppSession::default()
                };
                st.connected_at = None;
                let ttl = self.inner.config.qr_ttl;
                self.arm_countdown(&mut st, ttl);
                self.persist(&st).await;
                Ok(st.session.clone())
            }
            Err(e) if e.is_transport() => Err(e),
            Err(e) => {
                tracing::error!("❌ Falha ao criar sessão WhatsApp '{}': {}", self.inner.key, e);
                st.fail(&e);
                self.persist(&st).await;
                Err(e)
            }
        }
    }

    /// Renovação manual do QR: cancela e substitui o countdown em curso
    pub async fn refresh_qr(&self) -> Result<WhatsAppSession> {
        let session_id = {
            let mut st = self.inner.state.lock().await;
            let session_id = st.session.session_id.clone().ok_or(WhatsAppError::NoSession)?;
            if st.session.status != SessionStatus::Connecting {
                return Err(WhatsAppError::InvalidState(format!(
                    "cannot refresh QR while {}",
                    st.session.status
                )));
            }
            st.stop_countdown();
            session_id
        };

        self.refresh_for(&session_id).await
    }

    async fn refresh_for(&self, session_id: &str) -> Result<WhatsAppSession> {
        let result = self.inner.provider.refresh_qr(session_id).await;

        let mut st = self.inner.state.lock().await;
        if st.session.session_id.as_deref() != Some(session_id)
            || st.session.status != SessionStatus::Connecting
        {
            // Sessão mudou durante a chamada
            return Ok(st.session.clone());
        }

        let ttl = self.inner.config.qr_ttl;
        match result {
            Ok(qr_code) => {
                tracing::info!("🔁 QR renovado para a sessão '{}'", self.inner.key);
                st.session.qr_code = qr_code;
                st.session.error = None;
                self.arm_countdown(&mut st, ttl);
                self.persist(&st).await;
                Ok(st.session.clone())
            }
            Err(e) if e.is_transport() => {
                tracing::warn!("⚠️ Falha de rede ao renovar QR '{}': {}", self.inner.key, e);
                self.arm_countdown(&mut st, ttl);
                Err(e)
            }
            Err(e) => {
                tracing::error!("❌ Fornecedor recusou novo QR '{}': {}", self.inner.key, e);
                st.fail(&e);
                self.persist(&st).await;
                Err(e)
            }
        }
    }

    async fn on_qr_expired(&self, generation: u64) {
        let session_id = {
            let mut st = self.inner.state.lock().await;
            if st.qr_generation != generation || st.session.status != SessionStatus::Connecting {
                return;
            }
            // O countdown corrente é esta própria tarefa: soltar sem abortar
            if let Some(task) = st.qr_timer.take() {
                task.detach();
            }
            match st.session.session_id.clone() {
                Some(id) => id,
                None => return,
            }
        };

        tracing::info!("⏰ QR expirado para a sessão '{}', renovando", self.inner.key);
        if let Err(e) = self.refresh_for(&session_id).await {
            tracing::warn!("⚠️ Renovação automática do QR falhou: {}", e);
        }
    }

    fn arm_countdown(&self, st: &mut SessionState, delay: Duration) {
        st.qr_generation += 1;
        let generation = st.qr_generation;
        st.session.qr_expires_at = chrono::Duration::from_std(delay)
            .ok()
            .map(|d| Utc::now() + d);

        let weak = Arc::downgrade(&self.inner);
        st.qr_timer = Some(ScheduledTask::after(
            "whatsapp-qr-countdown",
            delay,
            move || async move {
                if let Some(inner) = weak.upgrade() {
                    SessionManager { inner }.on_qr_expired(generation).await;
                }
            },
        ));
    }

    /// Consulta o status no fornecedor e aplica a transição correspondente.
    ///
    /// Falha de rede não altera o estado e é devolvida ao chamador.
    ///
    /// Em `failed` não há consulta: só um novo `connect()` sai desse estado.
    pub async fn poll_status(&self) -> Result<WhatsAppSession> {
        let session_id = {
            let st = self.inner.state.lock().await;
            let session_id = st.session.session_id.clone().ok_or(WhatsAppError::NoSession)?;
            if st.session.status == SessionStatus::Failed {
                return Ok(st.session.clone());
            }
            session_id
        };

        let result = self.inner.provider.connection_status(&session_id).await;

        let mut st = self.inner.state.lock().await;
        if st.session.session_id.as_deref() != Some(session_id.as_str()) {
            return Ok(st.session.clone());
        }

        match result {
            Ok(info) if info.connected => {
                if st.session.status != SessionStatus::Connected {
                    tracing::info!(
                        "✅ Sessão WhatsApp '{}' conectada ({})",
                        self.inner.key,
                        info.phone_number.as_deref().unwrap_or("número desconhecido")
                    );
                    st.connected_at = Some(Utc::now());
                }
                st.stop_countdown();
                st.session.status = SessionStatus::Connected;
                st.session.qr_code = None;
                st.session.error = None;
                if info.phone_number.is_some() {
                    st.session.phone_number = info.phone_number;
                }
                if info.profile_name.is_some() {
                    st.session.profile_name = info.profile_name;
                }
                self.persist(&st).await;
            }
            Ok(_) => {
                if st.session.status == SessionStatus::Connected {
                    tracing::warn!(
                        "🔌 Sessão WhatsApp '{}' não está mais conectada",
                        self.inner.key
                    );
                    st.clear();
                    self.persist(&st).await;
                }
            }
            Err(e) if e.is_transport() => return Err(e),
            Err(e) => {
                match st.session.status {
                    SessionStatus::Connecting => {
                        tracing::error!("❌ Sessão WhatsApp '{}' falhou: {}", self.inner.key, e);
                        st.fail(&e);
                        self.persist(&st).await;
                    }
                    SessionStatus::Connected => {
                        tracing::warn!(
                            "🔌 Sessão WhatsApp '{}' rejeitada pelo fornecedor: {}",
                            self.inner.key,
                            e
                        );
                        st.clear();
                        self.persist(&st).await;
                    }
                    _ => {}
                }
                return Err(e);
            }
        }

        Ok(st.session.clone())
    }

    /// Poll periódico enquanto a sessão estiver `connecting`. Para sozinho
    /// quando o estado muda; `disconnect()` também o cancela.
    pub async fn start_status_polling(&self, every: Duration) -> bool {
        let mut st = self.inner.state.lock().await;
        if st.session.status != SessionStatus::Connecting {
            return false;
        }

        let weak = Arc::downgrade(&self.inner);
        st.poller = Some(ScheduledTask::every(
            "whatsapp-status-poll",
            every,
            move || {
                let weak = weak.clone();
                async move {
                    let Some(inner) = weak.upgrade() else {
                        return ControlFlow::Break(());
                    };
                    match (SessionManager { inner }).poll_status().await {
                        Ok(session) if session.status == SessionStatus::Connecting => {
                            ControlFlow::Continue(())
                        }
                        Ok(_) => ControlFlow::Break(()),
                        Err(e) if e.is_transport() => {
                            tracing::warn!("⚠️ Poll de status falhou (rede): {}", e);
                            ControlFlow::Continue(())
                        }
                        Err(_) => ControlFlow::Break(()),
                    }
                }
            },
        ));
        true
    }

    /// `connecting|connected -> disconnected`. Faz logout e remove a instância
    /// no fornecedor; falhas ali são apenas registradas.
    pub async fn disconnect(&self) -> Result<WhatsAppSession> {
        let session_id = {
            let mut st = self.inner.state.lock().await;
            st.poller = None;
            st.stop_countdown();
            st.session.session_id.clone()
        };

        if let Some(id) = &session_id {
            self.release(id).await;
        }

        let mut st = self.inner.state.lock().await;
        if st.session.session_id == session_id {
            st.poller = None;
            st.clear();
            self.persist(&st).await;
            tracing::info!("👋 Sessão WhatsApp '{}' desconectada", self.inner.key);
        }
        Ok(st.session.clone())
    }

    /// Logout seguido da remoção da instância no fornecedor
    async fn release(&self, session_id: &str) {
        let provider = &self.inner.provider;
        if let Err(e) = provider.disconnect(session_id).await {
            tracing::warn!("⚠️ Logout no fornecedor falhou para {}: {}", session_id, e);
        }
        match provider.delete_session(session_id).await {
            Ok(()) => tracing::debug!("🗑️ Instância {} liberada no fornecedor", session_id),
            Err(e) => tracing::warn!("⚠️ Remoção da instância {} falhou: {}", session_id, e),
        }
    }

    async fn persist(&self, st: &SessionState) {
        let result = match st.snapshot() {
            Some(snapshot) => self.inner.store.save(&self.inner.key, &snapshot).await,
            None => self.inner.store.remove(&self.inner.key).await,
        };
        if let Err(e) = result {
            tracing::warn!("⚠️ Falha ao persistir snapshot '{}': {}", self.inner.key, e);
        }
    }
}
