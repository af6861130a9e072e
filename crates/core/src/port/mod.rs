// Port Layer - Interfaces for external dependencies

pub mod time_provider; // Only external dependency of a bucket

// Re-exports
pub use time_provider::{ManualTimeProvider, SystemTimeProvider, TimeProvider};
