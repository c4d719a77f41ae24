use tracing::{debug, error, info, warn};

pub fn log_request_received(endpoint: &str, method: &str) {
    info!("Request received: {} {}", method, endpoint);
}

pub fn log_request_processed(endpoint: &str, status: u16, duration_ms: u64) {
    info!("Request processed: {} - Status: {} - Duration: {}ms",
          endpoint, status, duration_ms);
}

pub fn log_probe_finished(provider_id: &str, base_url: &str, success: bool, attempts: usize) {
    if success {
        info!("🔓 Credenciais válidas: {} em {} ({} tentativas)", provider_id, base_url, attempts);
    } else {
        warn!("🔒 Credenciais não confirmadas: {} em {} ({} tentativas)", provider_id, base_url, attempts);
    }
}

pub fn log_rate_limited(identifier: &str, endpoint: &str, retry_after_ms: u64) {
    warn!("⏳ Rate limit excedido: {} em {} - retry em {}ms", identifier, endpoint, retry_after_ms);
}

pub fn log_whatsapp_event(tenant: &str, event: &str) {
    info!("📱 WhatsApp [{}]: {}", tenant, event);
}

pub fn log_config_loaded(env: &str) {
    info!("Configuration loaded successfully for environment: {}", env);
}

pub fn log_server_startup(port: u16) {
    info!("🚀 Gestor middleware server starting on port {}", port);
}

pub fn log_server_ready(port: u16) {
    info!("✅ Server ready and listening on http://0.0.0.0:{}", port);
}

pub fn log_health_check() {
    debug!("Health check requested");
}

pub fn log_validation_error(field: &str, message: &str) {
    warn!("Validation error: {} - {}", field, message);
}

pub fn log_info(message: &str) {
    info!("{}", message);
}

pub fn log_error(message: &str) {
    error!("{}", message);
}

pub fn log_warning(message: &str) {
    warn!("{}", message);
}
