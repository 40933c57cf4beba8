//! Keystone v3 authentication and service catalog lookup

use super::CloudError;
use crate::config::{AuthSection, AuthType, CloudConfig, Interface};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// An issued token together with the service catalog it was scoped to
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
    pub catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub region_id: Option<String>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    project: Option<ProjectRef>,
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectRef {
    id: String,
}

impl AuthSession {
    /// Authenticate against Keystone and return the scoped session
    pub async fn authenticate(client: &Client, config: &CloudConfig) -> Result<Self, CloudError> {
        let url = tokens_url(config.auth.auth_url.as_deref().unwrap_or_default());
        let body = build_auth_request(config.auth_type, &config.auth);

        debug!(
            "Requesting {} token from {}",
            config.auth_type.as_str(),
            url
        );

        let response = client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CloudError::Connection {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Keystone rejected authentication: {}", status);
            return Err(CloudError::Authentication {
                status: status.as_u16(),
                body,
            });
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| CloudError::InvalidResponse {
                url: url.clone(),
                reason: format!("missing {SUBJECT_TOKEN_HEADER} header"),
            })?;

        let parsed: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| CloudError::InvalidResponse {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

        debug!(
            "Token issued, expires at {:?}, {} catalog entries",
            parsed.token.expires_at,
            parsed.token.catalog.len()
        );

        Ok(AuthSession {
            token,
            expires_at: parsed.token.expires_at,
            project_id: parsed.token.project.map(|p| p.id),
            catalog: parsed.token.catalog,
        })
    }

    /// Whether the token has already expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// Find the endpoint URL for a service type, interface and optional region
    pub fn endpoint_for(
        &self,
        service_type: &str,
        interface: Interface,
        region: Option<&str>,
    ) -> Result<String, CloudError> {
        let not_found = |reason: String| CloudError::EndpointNotFound {
            service_type: service_type.to_string(),
            reason,
        };

        let entry = self
            .catalog
            .iter()
            .find(|entry| entry.service_type == service_type)
            .ok_or_else(|| not_found("service is not in the catalog".to_string()))?;

        entry
            .endpoints
            .iter()
            .filter(|ep| ep.interface == interface.as_str())
            .find(|ep| match region {
                Some(region) => {
                    ep.region.as_deref() == Some(region) || ep.region_id.as_deref() == Some(region)
                }
                None => true,
            })
            .map(|ep| ep.url.clone())
            .ok_or_else(|| {
                not_found(format!(
                    "no {} endpoint{}",
                    interface.as_str(),
                    region
                        .map(|r| format!(" in region {r}"))
                        .unwrap_or_default()
                ))
            })
    }
}

/// Token endpoint for an auth URL, with or without a `/v3` suffix
pub fn tokens_url(auth_url: &str) -> String {
    let base = auth_url.trim_end_matches('/');
    if base.ends_with("/v3") {
        format!("{base}/auth/tokens")
    } else {
        format!("{base}/v3/auth/tokens")
    }
}

/// Build the body of `POST /v3/auth/tokens`
pub fn build_auth_request(auth_type: AuthType, auth: &AuthSection) -> Value {
    let identity = match auth_type {
        AuthType::Password => {
            let mut user = serde_json::Map::new();
            if let Some(id) = &auth.user_id {
                user.insert("id".into(), json!(id));
            }
            if let Some(name) = &auth.username {
                user.insert("name".into(), json!(name));
                if let Some(domain) = user_domain(auth) {
                    user.insert("domain".into(), domain);
                }
            }
            user.insert("password".into(), json!(auth.password));
            json!({
                "methods": ["password"],
                "password": { "user": user }
            })
        }
        AuthType::Token => json!({
            "methods": ["token"],
            "token": { "id": auth.token }
        }),
        AuthType::ApplicationCredential => json!({
            "methods": ["application_credential"],
            "application_credential": {
                "id": auth.application_credential_id,
                "secret": auth.application_credential_secret
            }
        }),
    };

    let mut request = json!({ "auth": { "identity": identity } });
    // Application credentials carry their own scope
    if auth_type != AuthType::ApplicationCredential {
        if let Some(scope) = scope(auth) {
            request["auth"]["scope"] = scope;
        }
    }
    request
}

fn user_domain(auth: &AuthSection) -> Option<Value> {
    domain_ref(
        auth.user_domain_id.as_ref().or(auth.domain_id.as_ref()),
        auth.user_domain_name.as_ref().or(auth.domain_name.as_ref()),
    )
    .or_else(|| Some(json!({ "id": "default" })))
}

fn scope(auth: &AuthSection) -> Option<Value> {
    if let Some(id) = &auth.project_id {
        return Some(json!({ "project": { "id": id } }));
    }
    if let Some(name) = &auth.project_name {
        let domain = domain_ref(
            auth.project_domain_id.as_ref().or(auth.domain_id.as_ref()),
            auth.project_domain_name
                .as_ref()
                .or(auth.domain_name.as_ref()),
        )
        .unwrap_or_else(|| json!({ "id": "default" }));
        return Some(json!({ "project": { "name": name, "domain": domain } }));
    }
    domain_ref(auth.domain_id.as_ref(), auth.domain_name.as_ref())
        .map(|domain| json!({ "domain": domain }))
}

fn domain_ref(id: Option<&String>, name: Option<&String>) -> Option<Value> {
    match (id, name) {
        (Some(id), _) => Some(json!({ "id": id })),
        (None, Some(name)) => Some(json!({ "name": name })),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn password_auth() -> AuthSection {
        AuthSection {
            auth_url: Some("https://identity.example.com".to_string()),
            username: Some("user".to_string()),
            password: Some("password".to_string()),
            project_name: Some("someproject".to_string()),
            ..Default::default()
        }
    }

    fn session(catalog: Value) -> AuthSession {
        AuthSession {
            token: "gAAAAA".to_string(),
            expires_at: None,
            project_id: None,
            catalog: serde_json::from_value(catalog).unwrap(),
        }
    }

    #[test]
    fn test_tokens_url() {
        assert_eq!(
            tokens_url("https://identity.example.com"),
            "https://identity.example.com/v3/auth/tokens"
        );
        assert_eq!(
            tokens_url("https://identity.example.com/v3/"),
            "https://identity.example.com/v3/auth/tokens"
        );
        assert_eq!(
            tokens_url("http://10.0.0.5/identity"),
            "http://10.0.0.5/identity/v3/auth/tokens"
        );
    }

    #[test]
    fn test_password_request_defaults_domains() {
        let body = build_auth_request(AuthType::Password, &password_auth());

        assert_eq!(body["auth"]["identity"]["methods"], json!(["password"]));
        let user = &body["auth"]["identity"]["password"]["user"];
        assert_eq!(user["name"], "user");
        assert_eq!(user["password"], "password");
        assert_eq!(user["domain"], json!({"id": "default"}));
        assert_eq!(
            body["auth"]["scope"],
            json!({"project": {"name": "someproject", "domain": {"id": "default"}}})
        );
    }

    #[test]
    fn test_password_request_with_named_domains() {
        let auth = AuthSection {
            user_domain_name: Some("Users".to_string()),
            project_domain_name: Some("Projects".to_string()),
            ..password_auth()
        };
        let body = build_auth_request(AuthType::Password, &auth);

        assert_eq!(
            body["auth"]["identity"]["password"]["user"]["domain"],
            json!({"name": "Users"})
        );
        assert_eq!(
            body["auth"]["scope"]["project"]["domain"],
            json!({"name": "Projects"})
        );
    }

    #[test]
    fn test_project_id_scope_wins() {
        let auth = AuthSection {
            project_id: Some("55e2ce24b2a245b09f181bf025724cbe".to_string()),
            ..password_auth()
        };
        let body = build_auth_request(AuthType::Password, &auth);

        assert_eq!(
            body["auth"]["scope"],
            json!({"project": {"id": "55e2ce24b2a245b09f181bf025724cbe"}})
        );
    }

    #[test]
    fn test_user_id_request_has_no_domain() {
        let auth = AuthSection {
            user_id: Some("u-123".to_string()),
            password: Some("pw".to_string()),
            ..Default::default()
        };
        let body = build_auth_request(AuthType::Password, &auth);

        let user = &body["auth"]["identity"]["password"]["user"];
        assert_eq!(user["id"], "u-123");
        assert!(user.get("domain").is_none());
        assert!(body["auth"].get("scope").is_none());
    }

    #[test]
    fn test_token_request() {
        let auth = AuthSection {
            token: Some("tok".to_string()),
            project_id: Some("p1".to_string()),
            ..Default::default()
        };
        let body = build_auth_request(AuthType::Token, &auth);

        assert_eq!(body["auth"]["identity"]["token"]["id"], "tok");
        assert_eq!(body["auth"]["scope"]["project"]["id"], "p1");
    }

    #[test]
    fn test_application_credential_request_is_unscoped() {
        let auth = AuthSection {
            application_credential_id: Some("ac-1".to_string()),
            application_credential_secret: Some("s3cr3t".to_string()),
            project_name: Some("ignored".to_string()),
            ..Default::default()
        };
        let body = build_auth_request(AuthType::ApplicationCredential, &auth);

        assert_eq!(
            body["auth"]["identity"]["methods"],
            json!(["application_credential"])
        );
        assert!(body["auth"].get("scope").is_none());
    }

    #[test]
    fn test_endpoint_lookup_by_interface_and_region() {
        let session = session(json!([
            {
                "type": "network",
                "name": "neutron",
                "endpoints": [
                    {"interface": "public", "region": "RegionOne", "url": "https://net-one.example.com"},
                    {"interface": "internal", "region": "RegionOne", "url": "http://net-one.internal:9696"},
                    {"interface": "public", "region_id": "RegionTwo", "url": "https://net-two.example.com"}
                ]
            }
        ]));

        assert_eq!(
            session
                .endpoint_for("network", Interface::Public, None)
                .unwrap(),
            "https://net-one.example.com"
        );
        assert_eq!(
            session
                .endpoint_for("network", Interface::Internal, Some("RegionOne"))
                .unwrap(),
            "http://net-one.internal:9696"
        );
        assert_eq!(
            session
                .endpoint_for("network", Interface::Public, Some("RegionTwo"))
                .unwrap(),
            "https://net-two.example.com"
        );
    }

    #[test]
    fn test_endpoint_lookup_failures() {
        let session = session(json!([
            {"type": "compute", "endpoints": []},
            {"type": "network", "endpoints": [
                {"interface": "public", "region": "RegionOne", "url": "https://net.example.com"}
            ]}
        ]));

        let err = session
            .endpoint_for("network", Interface::Admin, None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Endpoint for service type network not found: no admin endpoint"
        );

        let err = session
            .endpoint_for("network", Interface::Public, Some("RegionNine"))
            .unwrap_err();
        assert!(err.to_string().ends_with("in region RegionNine"));

        let err = session
            .endpoint_for("dns", Interface::Public, None)
            .unwrap_err();
        assert!(matches!(err, CloudError::EndpointNotFound { .. }));
    }

    #[test]
    fn test_token_expiry() {
        let mut session = session(json!([]));
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        assert!(!session.is_expired(now));

        session.expires_at = Some(Utc.with_ymd_and_hms(2026, 1, 1, 11, 0, 0).unwrap());
        assert!(session.is_expired(now));
    }
}
