#![warn(clippy::unwrap_used)]

pub mod registry;
pub mod retry;
pub mod service;

pub use registry::ModelRegistry;
pub use retry::RetryPolicy;
pub use service::{BanditService, Selection};
