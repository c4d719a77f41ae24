/// Middleware layer para o Axum router
///
/// - Rate limiting por cliente (API geral e teste de credenciais)

pub mod rate_limit;

pub use rate_limit::{api_rate_limit, client_identifier, probe_rate_limit};
