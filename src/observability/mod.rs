//! Observability for module invocations
//!
//! Structured logging only; a single-shot module exposes no metrics or
//! health endpoints.

pub mod logging;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};

// Span macros for structured logging
pub use logging::{cloud_span, module_span};
