//! Tarefas agendadas com ciclo de vida único
//!
//! O handle é dono da tarefa: o `drop` aborta o timer, então um countdown
//! nunca sobrevive à sessão que o criou.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// Executa `job` uma vez, depois de `delay`
    pub fn after<F, Fut>(name: &'static str, delay: Duration, job: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            job().await;
        });

        Self {
            name,
            handle: Some(handle),
        }
    }

    /// Executa `job` a cada `period` (primeira execução após um período)
    /// até ele devolver `ControlFlow::Break`.
    pub fn every<F, Fut>(name: &'static str, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if job().await.is_break() {
                    break;
                }
            }
        });

        Self {
            name,
            handle: Some(handle),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Solta o handle sem abortar: a tarefa corrente termina sozinha.
    /// Usado pelo próprio job antes de agendar o seu substituto.
    pub fn detach(mut self) {
        self.handle.take();
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                tracing::debug!("⏹️ Tarefa '{}' cancelada", self.name);
            }
            handle.abort();
        }
    }
}
