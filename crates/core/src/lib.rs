// TokenGate Core - Per-client token-bucket admission control
// NO infrastructure dependencies: the clock is the only port

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{Limiter, LimiterConfig};
pub use domain::{Decision, RefillPolicy};
pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
