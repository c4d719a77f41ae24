pub mod settings;

pub use settings::{
    ProvedoresSettings, RateLimitSettings, ServerSettings, Settings, WhatsAppProviderKind,
    WhatsAppSettings,
};
