// Application Layer - The limiter and its configuration

pub mod config;
pub mod constants;
pub mod limiter;

// Re-exports
pub use config::LimiterConfig;
pub use limiter::Limiter;
