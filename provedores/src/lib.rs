//! Provedores: teste de credenciais em painéis de revenda
//!
//! Cada provedor tem uma `TestStrategy` (ordem empírica de tentativas). Quem
//! não tem estratégia própria usa a universal: Xtream, formulário e JSON POST.
//!
//! ## Uso
//!
//! ```rust,ignore
//! use provedores::{Credentials, ProviderProber, Registry};
//!
//! let registry = Registry::builtin();
//! let prober = ProviderProber::new()?;
//! let report = prober
//!     .probe_provider(&registry, "mundogf", "painel.exemplo.com", &Credentials::new("user", "pass"))
//!     .await?;
//!
//! if report.success {
//!     println!("autenticado via {}", report.winning_step.unwrap().label);
//! }
//! ```

pub mod classifier;
pub mod error;
pub mod form;
pub mod prober;
pub mod registry;
pub mod strategy;

pub use classifier::{AttemptVerdict, ResponseClass};
pub use error::{ProvedorError, Result};
pub use prober::{normalize_base_url, Credentials, ProbeOutcome, ProbeReport, ProviderProber};
pub use registry::{LoginMethod, ProviderConfig, Registry};
pub use strategy::{StepKind, SuccessMarker, TestStep, TestStrategy};
