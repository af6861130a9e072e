// Domain Layer - Token bucket state and arithmetic

pub mod bucket;
pub mod decision;
pub mod policy;

// Re-exports
pub use bucket::{Bucket, BucketState};
pub use decision::Decision;
pub use policy::RefillPolicy;
