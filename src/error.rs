//! Error types for the router facts module
//!
//! Every failure ends up as a single message in the module result; the
//! variants only record which stage produced it.

use crate::cloud::CloudError;
use crate::config::ConfigError;
use crate::module::ModuleOutcome;
use thiserror::Error;

/// Main error type for module invocations
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Failed to read module arguments: {0}")]
    ArgsRead(#[from] std::io::Error),

    #[error("Failed to parse module arguments as JSON: {0}")]
    ArgsParse(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Cloud errors keep their message verbatim
    #[error("{0}")]
    Cloud(#[from] CloudError),
}

impl ModuleError {
    /// Create invalid arguments error
    pub fn invalid_arguments<S: Into<String>>(message: S) -> Self {
        Self::InvalidArguments(message.into())
    }

    /// Collapse into the failure outcome reported to the engine
    pub fn into_outcome(self) -> ModuleOutcome {
        ModuleOutcome::failure(self.to_string())
    }
}

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;
