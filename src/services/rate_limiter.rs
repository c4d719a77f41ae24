use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::RateLimitSettings;

/// Acima deste número de identificadores a checagem limpa janelas vencidas
const PURGE_THRESHOLD: usize = 10_000;

/// Fonte de tempo em milissegundos desde a época Unix
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    reset_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Fim da janela atual (ms desde a época)
    pub reset_at_ms: u64,
    /// Zero quando permitido
    pub retry_after_ms: u64,
}

impl RateLimitDecision {
    pub fn reset_at_secs(&self) -> u64 {
        self.reset_at_ms.div_ceil(1000)
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_ms.div_ceil(1000)
    }
}

/// Rate limiter de janela fixa, em memória, por identificador de cliente.
///
/// Primeira requisição (ou janela vencida) abre uma janela nova com contagem 1.
/// Dentro da janela, `count >= max_requests` rejeita até `reset_at`.
#[derive(Clone)]
pub struct RateLimiter {
    entries: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        config: &RateLimitSettings,
    ) -> RateLimitDecision {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().await;

        if entries.len() >= PURGE_THRESHOLD {
            entries.retain(|_, entry| now < entry.reset_at_ms);
        }

        let entry = entries
            .entry(identifier.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                reset_at_ms: 0,
            });

        if entry.count == 0 || now >= entry.reset_at_ms {
            *entry = RateLimitEntry {
                count: 1,
                reset_at_ms: now + config.window_ms,
            };
            return RateLimitDecision {
                allowed: true,
                limit: config.max_requests,
                remaining: config.max_requests.saturating_sub(1),
                reset_at_ms: entry.reset_at_ms,
                retry_after_ms: 0,
            };
        }

        if entry.count >= config.max_requests {
            return RateLimitDecision {
                allowed: false,
                limit: config.max_requests,
                remaining: 0,
                reset_at_ms: entry.reset_at_ms,
                retry_after_ms: entry.reset_at_ms - now,
            };
        }

        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            limit: config.max_requests,
            remaining: config.max_requests - entry.count,
            reset_at_ms: entry.reset_at_ms,
            retry_after_ms: 0,
        }
    }

    /// Remove identificadores cuja janela já venceu. Devolve quantos saíram.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| now < entry.reset_at_ms);
        before - entries.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct ManualClock(AtomicU64);

    impl ManualClock {
        fn set(&self, ms: u64) {
            self.0.store(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        clock.set(1_000_000);
        (RateLimiter::with_clock(clock.clone()), clock)
    }

    const CONFIG: RateLimitSettings = RateLimitSettings {
        window_ms: 1_000,
        max_requests: 3,
    };

    #[tokio::test]
    async fn test_three_allowed_then_rejected_then_reset() {
        let (limiter, clock) = limiter();

        for expected_remaining in [2, 1, 0] {
            let decision = limiter.check_rate_limit("k", &CONFIG).await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
            assert_eq!(decision.reset_at_ms, 1_001_000);
        }

        clock.set(1_000_400);
        let rejected = limiter.check_rate_limit("k", &CONFIG).await;
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.retry_after_ms, 600);
        assert_eq!(rejected.retry_after_secs(), 1);

        clock.set(1_001_000);
        let fresh = limiter.check_rate_limit("k", &CONFIG).await;
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 2);
        assert_eq!(fresh.reset_at_ms, 1_002_000);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let (limiter, _clock) = limiter();
        for _ in 0..3 {
            limiter.check_rate_limit("a", &CONFIG).await;
        }
        assert!(!limiter.check_rate_limit("a", &CONFIG).await.allowed);
        assert!(limiter.check_rate_limit("b", &CONFIG).await.allowed);
    }

    #[tokio::test]
    async fn test_purge_drops_only_elapsed_windows() {
        let (limiter, clock) = limiter();
        limiter.check_rate_limit("old", &CONFIG).await;
        clock.set(1_000_900);
        limiter.check_rate_limit("new", &CONFIG).await;

        clock.set(1_001_000);
        assert_eq!(limiter.purge_expired().await, 1);
        assert_eq!(limiter.tracked_keys().await, 1);

        // A janela de "new" continua contando depois da limpeza
        let decision = limiter.check_rate_limit("new", &CONFIG).await;
        assert_eq!(decision.remaining, 1);
    }
}
