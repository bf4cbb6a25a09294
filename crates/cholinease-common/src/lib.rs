//! cholinease-common — Shared error type and configuration used across CholinEase crates.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Config, ModelConfig, PadelConfig, PipelineConfig, ServerConfig};
pub use error::{CholinEaseError, Result};
