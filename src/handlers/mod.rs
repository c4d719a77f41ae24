// Handlers HTTP: saúde, provedores, WhatsApp e webhook de recibos
pub mod health;
pub mod provedores_api;
pub mod webhook;
pub mod whatsapp_api;

pub use health::*;
pub use provedores_api::*;
pub use webhook::*;
