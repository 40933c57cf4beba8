//! Cloud configuration
//!
//! Authentication and endpoint settings are resolved into one explicit
//! [`CloudConfig`] that is handed to the cloud connector. Three layers feed
//! it, highest precedence first:
//!
//! 1. module arguments (`auth`, `region_name`, `interface`, ...)
//! 2. the named cloud in a TOML clouds file
//! 3. `OS_*` environment variables
//!
//! ## Clouds file
//!
//! ```toml
//! [clouds.mycloud]
//! region_name = "RegionOne"
//! interface = "internal"
//!
//! [clouds.mycloud.auth]
//! auth_url = "https://identity.example.com"
//! username = "user"
//! password = "password"
//! project_name = "someproject"
//! user_domain_name = "Default"
//! project_domain_name = "Default"
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Keystone credentials and scope
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct AuthSection {
    /// Identity service URL
    pub auth_url: Option<String>,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub password: Option<String>,
    pub project_name: Option<String>,
    pub project_id: Option<String>,
    pub user_domain_name: Option<String>,
    pub user_domain_id: Option<String>,
    pub project_domain_name: Option<String>,
    pub project_domain_id: Option<String>,
    /// Domain used for both user and project when the specific ones are unset
    pub domain_name: Option<String>,
    pub domain_id: Option<String>,
    pub token: Option<String>,
    pub application_credential_id: Option<String>,
    pub application_credential_secret: Option<String>,
}

impl AuthSection {
    /// Fill every unset field from `lower`
    pub fn merge(self, lower: AuthSection) -> AuthSection {
        AuthSection {
            auth_url: self.auth_url.or(lower.auth_url),
            username: self.username.or(lower.username),
            user_id: self.user_id.or(lower.user_id),
            password: self.password.or(lower.password),
            project_name: self.project_name.or(lower.project_name),
            project_id: self.project_id.or(lower.project_id),
            user_domain_name: self.user_domain_name.or(lower.user_domain_name),
            user_domain_id: self.user_domain_id.or(lower.user_domain_id),
            project_domain_name: self.project_domain_name.or(lower.project_domain_name),
            project_domain_id: self.project_domain_id.or(lower.project_domain_id),
            domain_name: self.domain_name.or(lower.domain_name),
            domain_id: self.domain_id.or(lower.domain_id),
            token: self.token.or(lower.token),
            application_credential_id: self
                .application_credential_id
                .or(lower.application_credential_id),
            application_credential_secret: self
                .application_credential_secret
                .or(lower.application_credential_secret),
        }
    }

    /// Every non-empty value of the section. The whole `auth` argument is
    /// no-log, so none of these may appear in module output.
    pub fn values(&self) -> Vec<String> {
        [
            &self.auth_url,
            &self.username,
            &self.user_id,
            &self.password,
            &self.project_name,
            &self.project_id,
            &self.user_domain_name,
            &self.user_domain_id,
            &self.project_domain_name,
            &self.project_domain_id,
            &self.domain_name,
            &self.domain_id,
            &self.token,
            &self.application_credential_id,
            &self.application_credential_secret,
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect()
    }
}

/// Keystone authentication plugin
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    Password,
    Token,
    #[serde(rename = "v3applicationcredential")]
    ApplicationCredential,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Password => "password",
            AuthType::Token => "token",
            AuthType::ApplicationCredential => "v3applicationcredential",
        }
    }

    /// Parse the value of `OS_AUTH_TYPE`
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "password" | "v3password" => Some(AuthType::Password),
            "token" | "v3token" => Some(AuthType::Token),
            "v3applicationcredential" | "applicationcredential" => {
                Some(AuthType::ApplicationCredential)
            }
            _ => None,
        }
    }
}

/// Service catalog endpoint interface
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    #[default]
    Public,
    Internal,
    Admin,
}

impl Interface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interface::Public => "public",
            Interface::Internal => "internal",
            Interface::Admin => "admin",
        }
    }

    /// Parse the value of `OS_INTERFACE`, accepting the legacy `*URL` forms
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().trim_end_matches("url") {
            "public" => Some(Interface::Public),
            "internal" => Some(Interface::Internal),
            "admin" => Some(Interface::Admin),
            _ => None,
        }
    }
}

/// One configuration layer. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudProfile {
    #[serde(default)]
    pub auth: AuthSection,
    pub auth_type: Option<AuthType>,
    pub region_name: Option<String>,
    pub interface: Option<Interface>,
    pub verify: Option<bool>,
    pub cacert: Option<PathBuf>,
    /// Client certificate (PEM) for mutual TLS
    pub cert: Option<PathBuf>,
    /// Private key (PEM) matching `cert`
    pub key: Option<PathBuf>,
    pub api_timeout: Option<u64>,
}

impl CloudProfile {
    /// Fill every unset field from `lower`
    pub fn merge(self, lower: CloudProfile) -> CloudProfile {
        CloudProfile {
            auth: self.auth.merge(lower.auth),
            auth_type: self.auth_type.or(lower.auth_type),
            region_name: self.region_name.or(lower.region_name),
            interface: self.interface.or(lower.interface),
            verify: self.verify.or(lower.verify),
            cacert: self.cacert.or(lower.cacert),
            cert: self.cert.or(lower.cert),
            key: self.key.or(lower.key),
            api_timeout: self.api_timeout.or(lower.api_timeout),
        }
    }

    /// Build a profile from `OS_*` variables using the given lookup
    pub fn from_env_with<F>(env: F) -> Result<CloudProfile, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| env(name).filter(|v| !v.is_empty());

        let auth_type = match var("OS_AUTH_TYPE") {
            Some(value) => Some(AuthType::parse(&value).ok_or_else(|| {
                ConfigError::InvalidConfig(format!("Unsupported OS_AUTH_TYPE '{value}'"))
            })?),
            None => None,
        };
        let interface = match var("OS_INTERFACE").or_else(|| var("OS_ENDPOINT_TYPE")) {
            Some(value) => Some(Interface::parse(&value).ok_or_else(|| {
                ConfigError::InvalidConfig(format!("Unsupported OS_INTERFACE '{value}'"))
            })?),
            None => None,
        };
        let api_timeout = match var("OS_API_TIMEOUT") {
            Some(value) => Some(value.parse::<u64>().map_err(|_| {
                ConfigError::InvalidConfig(format!("OS_API_TIMEOUT '{value}' is not a number"))
            })?),
            None => None,
        };

        Ok(CloudProfile {
            auth: AuthSection {
                auth_url: var("OS_AUTH_URL"),
                username: var("OS_USERNAME"),
                user_id: var("OS_USER_ID"),
                password: var("OS_PASSWORD"),
                project_name: var("OS_PROJECT_NAME").or_else(|| var("OS_TENANT_NAME")),
                project_id: var("OS_PROJECT_ID").or_else(|| var("OS_TENANT_ID")),
                user_domain_name: var("OS_USER_DOMAIN_NAME"),
                user_domain_id: var("OS_USER_DOMAIN_ID"),
                project_domain_name: var("OS_PROJECT_DOMAIN_NAME"),
                project_domain_id: var("OS_PROJECT_DOMAIN_ID"),
                domain_name: var("OS_DOMAIN_NAME"),
                domain_id: var("OS_DOMAIN_ID"),
                token: var("OS_TOKEN"),
                application_credential_id: var("OS_APPLICATION_CREDENTIAL_ID"),
                application_credential_secret: var("OS_APPLICATION_CREDENTIAL_SECRET"),
            },
            auth_type,
            region_name: var("OS_REGION_NAME"),
            interface,
            verify: None,
            cacert: var("OS_CACERT").map(PathBuf::from),
            cert: var("OS_CERT").map(PathBuf::from),
            key: var("OS_KEY").map(PathBuf::from),
            api_timeout,
        })
    }
}

/// Parsed clouds file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloudsFile {
    #[serde(default)]
    pub clouds: HashMap<String, CloudProfile>,
}

impl CloudsFile {
    /// Load a clouds file from TOML
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let file: CloudsFile = toml::from_str(&content)?;
        debug!(
            "Loaded {} cloud(s) from {}",
            file.clouds.len(),
            path.display()
        );
        Ok(file)
    }

    /// Look up a named cloud
    pub fn cloud(&self, name: &str) -> Result<&CloudProfile, ConfigError> {
        self.clouds
            .get(name)
            .ok_or_else(|| ConfigError::CloudNotFound(name.to_string()))
    }
}

/// Fully resolved configuration handed to the cloud connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudConfig {
    pub auth: AuthSection,
    pub auth_type: AuthType,
    pub region_name: Option<String>,
    pub interface: Interface,
    /// Verify TLS certificates
    pub verify: bool,
    pub ca_cert: Option<PathBuf>,
    pub client_cert: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    /// Per-request timeout in seconds
    pub api_timeout: Option<u64>,
}

impl CloudConfig {
    /// Resolve the three configuration layers into a validated config.
    ///
    /// `cloud` names an entry of the clouds file; when unset `OS_CLOUD` is
    /// consulted. The clouds file is only read when a cloud name is known.
    pub fn load<F>(
        args: CloudProfile,
        cloud: Option<&str>,
        clouds_file: Option<&Path>,
        env: F,
    ) -> Result<CloudConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_profile = CloudProfile::from_env_with(&env)?;

        let cloud_name = cloud
            .map(str::to_string)
            .or_else(|| env("OS_CLOUD").filter(|v| !v.is_empty()));

        let file_profile = match cloud_name {
            Some(name) => {
                let path = match clouds_file {
                    Some(path) => path.to_path_buf(),
                    None => find_clouds_file(&env)
                        .ok_or_else(|| ConfigError::NoCloudsFile(name.clone()))?,
                };
                debug!("Resolving cloud '{}' from {}", name, path.display());
                CloudsFile::load_from_file(&path)?.cloud(&name)?.clone()
            }
            None => CloudProfile::default(),
        };

        Self::from_profile(args.merge(file_profile).merge(env_profile))
    }

    /// Validate a merged profile
    pub fn from_profile(profile: CloudProfile) -> Result<CloudConfig, ConfigError> {
        let auth_type = profile.auth_type.unwrap_or_default();
        let auth = profile.auth;

        let missing = |field: &'static str| ConfigError::MissingValue {
            field,
            auth_type: auth_type.as_str(),
        };

        if auth.auth_url.as_deref().map_or(true, str::is_empty) {
            return Err(missing("auth_url"));
        }

        match auth_type {
            AuthType::Password => {
                if auth.username.is_none() && auth.user_id.is_none() {
                    return Err(missing("username"));
                }
                if auth.password.is_none() {
                    return Err(missing("password"));
                }
            }
            AuthType::Token => {
                if auth.token.is_none() {
                    return Err(missing("token"));
                }
            }
            AuthType::ApplicationCredential => {
                if auth.application_credential_id.is_none() {
                    return Err(missing("application_credential_id"));
                }
                if auth.application_credential_secret.is_none() {
                    return Err(missing("application_credential_secret"));
                }
            }
        }

        Ok(CloudConfig {
            auth,
            auth_type,
            region_name: profile.region_name,
            interface: profile.interface.unwrap_or_default(),
            verify: profile.verify.unwrap_or(true),
            ca_cert: profile.cacert,
            client_cert: profile.cert,
            client_key: profile.key,
            api_timeout: profile.api_timeout,
        })
    }
}

/// First existing clouds file among the conventional locations
fn find_clouds_file<F>(env: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let mut candidates = vec![PathBuf::from("clouds.toml")];
    if let Some(home) = env("HOME") {
        candidates.push(Path::new(&home).join(".config/openstack/clouds.toml"));
    }
    candidates.push(PathBuf::from("/etc/openstack/clouds.toml"));

    candidates.into_iter().find(|path| path.exists())
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read clouds file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse clouds file: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Cloud {0} was not found")]
    CloudNotFound(String),
    #[error("Cloud {0} was requested but no clouds file was found")]
    NoCloudsFile(String),
    #[error("Missing value {field} required for auth plugin {auth_type}")]
    MissingValue {
        field: &'static str,
        auth_type: &'static str,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
