//! OpenStack cloud client abstraction
//!
//! The fact collector needs exactly one thing from the cloud: a router
//! search. [`CloudClient`] is that seam and [`CloudConnector`] is the factory
//! that turns an explicit [`CloudConfig`] into an authenticated client. The
//! HTTP implementation lives in [`network`] on top of the Keystone session
//! established in [`identity`].

use crate::config::CloudConfig;
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod filter;
pub mod identity;
pub mod network;

pub use network::{OpenStackCloud, OpenStackConnector};

/// A router record as returned by the Networking API, passed through untouched
pub type Router = Value;

/// Filter criteria for a search. Values may themselves be mappings.
pub type Filters = Map<String, Value>;

/// Cloud handle exposing the router search
#[async_trait]
pub trait CloudClient: Send + Sync {
    /// Search routers by name or id and by filter criteria.
    ///
    /// Both arguments are optional and not mutually exclusive: when both are
    /// given a router must satisfy both. `Ok(None)` is a valid "nothing
    /// found" answer.
    async fn search_routers(
        &self,
        name: Option<&str>,
        filters: Option<&Filters>,
    ) -> Result<Option<Vec<Router>>, CloudError>;
}

/// Factory producing an authenticated [`CloudClient`] from configuration
#[async_trait]
pub trait CloudConnector: Send + Sync {
    type Client: CloudClient;

    async fn connect(&self, config: &CloudConfig) -> Result<Self::Client, CloudError>;
}

/// Errors raised by the cloud client.
///
/// The fact collector does not classify these; it reports the `Display`
/// form verbatim.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CloudError {
    #[error("Failed to connect to {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Authentication failed: {status} {body}")]
    Authentication { status: u16, body: String },

    #[error("Endpoint for service type {service_type} not found: {reason}")]
    EndpointNotFound {
        service_type: String,
        reason: String,
    },

    #[error("Error fetching {resource}: {status} {body}")]
    Http {
        resource: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("Invalid cloud configuration: {0}")]
    Configuration(String),

    #[error("{0}")]
    Other(String),
}

impl CloudError {
    /// Create an error carrying only a message
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_error_displays_message_verbatim() {
        assert_eq!(CloudError::other("boom").to_string(), "boom");
    }

    #[test]
    fn test_http_error_message() {
        let error = CloudError::Http {
            resource: "routers".to_string(),
            status: 503,
            body: "Service Unavailable".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Error fetching routers: 503 Service Unavailable"
        );
    }

    #[test]
    fn test_authentication_error_message() {
        let error = CloudError::Authentication {
            status: 401,
            body: "The request you have made requires authentication.".to_string(),
        };
        assert!(error.to_string().starts_with("Authentication failed: 401"));
    }
}
