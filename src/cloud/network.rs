//! Networking (Neutron) client
//!
//! Lists routers through `GET /v2.0/routers`, following pagination links,
//! and narrows the result with [`filter_list`](super::filter::filter_list).

use super::filter::filter_list;
use super::identity::AuthSession;
use super::{CloudClient, CloudConnector, CloudError, Filters, Router};
use crate::config::CloudConfig;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Certificate, Client, Identity};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn, Instrument};
use url::Url;

const USER_AGENT: &str = concat!("os-routers-facts/", env!("CARGO_PKG_VERSION"));
const NETWORK_SERVICE_TYPE: &str = "network";
const NETWORK_API_VERSION: &str = "v2.0";

/// Connector building [`OpenStackCloud`] handles over HTTP
#[derive(Debug, Clone, Default)]
pub struct OpenStackConnector;

impl OpenStackConnector {
    pub fn new() -> Self {
        Self
    }

    fn build_http_client(config: &CloudConfig) -> Result<Client, CloudError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);

        if let Some(secs) = config.api_timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        if !config.verify {
            warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path).map_err(|e| {
                CloudError::Configuration(format!(
                    "unable to read CA bundle {}: {e}",
                    path.display()
                ))
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|e| {
                CloudError::Configuration(format!(
                    "invalid CA bundle {}: {e}",
                    path.display()
                ))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if let Some(identity) = Self::client_identity(config)? {
            builder = builder.identity(identity);
        }

        builder
            .build()
            .map_err(|e| CloudError::Configuration(e.to_string()))
    }

    /// Client certificate for mutual TLS. The key may live in its own file
    /// or alongside the certificate.
    fn client_identity(config: &CloudConfig) -> Result<Option<Identity>, CloudError> {
        let Some(cert_path) = &config.client_cert else {
            if config.client_key.is_some() {
                warn!("Ignoring client key without a client certificate");
            }
            return Ok(None);
        };

        let read = |path: &std::path::Path, what: &str| {
            std::fs::read(path).map_err(|e| {
                CloudError::Configuration(format!(
                    "unable to read client {what} {}: {e}",
                    path.display()
                ))
            })
        };

        let mut pem = match &config.client_key {
            Some(key_path) => read(key_path, "key")?,
            None => Vec::new(),
        };
        pem.extend(read(cert_path, "certificate")?);

        Identity::from_pem(&pem).map(Some).map_err(|e| {
            CloudError::Configuration(format!(
                "invalid client certificate {}: {e}",
                cert_path.display()
            ))
        })
    }
}

#[async_trait]
impl CloudConnector for OpenStackConnector {
    type Client = OpenStackCloud;

    async fn connect(&self, config: &CloudConfig) -> Result<OpenStackCloud, CloudError> {
        let client = Self::build_http_client(config)?;
        let session = AuthSession::authenticate(&client, config).await?;

        if session.is_expired(Utc::now()) {
            warn!("Keystone issued an already expired token");
        }

        let endpoint = session.endpoint_for(
            NETWORK_SERVICE_TYPE,
            config.interface,
            config.region_name.as_deref(),
        )?;
        let network_url = versioned_endpoint(&endpoint)?;

        debug!("Using network endpoint {}", network_url);

        Ok(OpenStackCloud {
            client,
            token: session.token,
            network_url,
        })
    }
}

/// Authenticated handle on the Networking API
#[derive(Clone)]
pub struct OpenStackCloud {
    client: Client,
    token: String,
    network_url: Url,
}

impl std::fmt::Debug for OpenStackCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenStackCloud")
            .field("token", &"***")
            .field("network_url", &self.network_url.as_str())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RouterPage {
    #[serde(default)]
    routers: Vec<Router>,
    #[serde(default)]
    routers_links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    rel: String,
    href: String,
}

impl OpenStackCloud {
    /// Build a handle from an already issued token and a network endpoint
    pub fn with_token(client: Client, token: String, endpoint: &str) -> Result<Self, CloudError> {
        Ok(Self {
            client,
            token,
            network_url: versioned_endpoint(endpoint)?,
        })
    }

    /// List every router visible to the token, following `next` links
    pub async fn list_routers(&self) -> Result<Vec<Router>, CloudError> {
        let mut url = join(&self.network_url, "routers")?;
        let mut routers = Vec::new();
        let mut visited = Vec::new();

        loop {
            let page = self.fetch_page(&url).await?;
            routers.extend(page.routers);
            visited.push(url);

            let next = page
                .routers_links
                .into_iter()
                .find(|link| link.rel == "next")
                .map(|link| link.href);

            match next {
                Some(href) => {
                    let next_url = Url::parse(&href).map_err(|e| CloudError::InvalidResponse {
                        url: href.clone(),
                        reason: format!("bad pagination link: {e}"),
                    })?;
                    if visited.contains(&next_url) {
                        warn!("Pagination loop detected at {}", next_url);
                        break;
                    }
                    debug!("Following pagination link {}", next_url);
                    url = next_url;
                }
                None => break,
            }
        }

        Ok(routers)
    }

    async fn fetch_page(&self, url: &Url) -> Result<RouterPage, CloudError> {
        let response = self
            .client
            .get(url.clone())
            .header("X-Auth-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| CloudError::Connection {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CloudError::Http {
                resource: "routers".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| CloudError::InvalidResponse {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl CloudClient for OpenStackCloud {
    async fn search_routers(
        &self,
        name: Option<&str>,
        filters: Option<&Filters>,
    ) -> Result<Option<Vec<Router>>, CloudError> {
        let span = crate::cloud_span!(operation = "search_routers", name = ?name);

        async move {
            let routers = self.list_routers().await?;
            let total = routers.len();
            let matched = filter_list(routers, name, filters);
            debug!("{} of {} routers matched", matched.len(), total);
            Ok::<_, CloudError>(Some(matched))
        }
        .instrument(span)
        .await
    }
}

/// Ensure the endpoint ends with the API version and a trailing slash so
/// relative joins land under it
fn versioned_endpoint(endpoint: &str) -> Result<Url, CloudError> {
    let base = endpoint.trim_end_matches('/');
    let versioned = if base.ends_with(NETWORK_API_VERSION) {
        format!("{base}/")
    } else {
        format!("{base}/{NETWORK_API_VERSION}/")
    };

    Url::parse(&versioned).map_err(|e| CloudError::EndpointNotFound {
        service_type: NETWORK_SERVICE_TYPE.to_string(),
        reason: format!("invalid endpoint URL {endpoint}: {e}"),
    })
}

fn join(base: &Url, path: &str) -> Result<Url, CloudError> {
    base.join(path).map_err(|e| CloudError::InvalidResponse {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versioned_endpoint_appends_version() {
        assert_eq!(
            versioned_endpoint("https://network.example.com:9696")
                .unwrap()
                .as_str(),
            "https://network.example.com:9696/v2.0/"
        );
        assert_eq!(
            versioned_endpoint("http://10.0.0.5/networking/").unwrap().as_str(),
            "http://10.0.0.5/networking/v2.0/"
        );
    }

    #[test]
    fn test_versioned_endpoint_keeps_existing_version() {
        assert_eq!(
            versioned_endpoint("https://network.example.com/v2.0")
                .unwrap()
                .as_str(),
            "https://network.example.com/v2.0/"
        );
    }

    #[test]
    fn test_versioned_endpoint_rejects_garbage() {
        assert!(matches!(
            versioned_endpoint("not a url"),
            Err(CloudError::EndpointNotFound { .. })
        ));
    }

    #[test]
    fn test_routers_url_join() {
        let base = versioned_endpoint("https://network.example.com").unwrap();
        assert_eq!(
            join(&base, "routers").unwrap().as_str(),
            "https://network.example.com/v2.0/routers"
        );
    }

    #[test]
    fn test_router_page_without_links() {
        let page: RouterPage = serde_json::from_str(r#"{"routers": []}"#).unwrap();
        assert!(page.routers.is_empty());
        assert!(page.routers_links.is_empty());
    }
}
