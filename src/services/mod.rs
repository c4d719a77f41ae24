pub mod rate_limiter;
pub mod whatsapp_sessions;

pub use rate_limiter::{Clock, RateLimitDecision, RateLimiter, SystemClock};
pub use whatsapp_sessions::{TenantWhatsApp, WhatsAppSessions, DEFAULT_TENANT};
