//! Module arguments
//!
//! Declares the arguments accepted by the module: the router lookup inputs
//! (`name`, `filters`) plus the authentication argument family shared by
//! every OpenStack module. Raw arguments are checked for unsupported keys,
//! validated against the JSON Schema derived from [`RouterFactsArgs`], and
//! only then deserialized.

use crate::cloud::Filters;
use crate::config::{AuthSection, AuthType, CloudProfile, Interface};
use crate::error::{ModuleError, ModuleResult};
use crate::module::mask_no_log;
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Name the engine knows this module by
pub const MODULE_NAME: &str = "os_routers_facts";

/// Prefix of engine-internal arguments such as `_ansible_check_mode`
const INTERNAL_PREFIX: &str = "_ansible_";

/// Replacement for no-log values echoed back in `invocation`
pub const NO_LOG_PLACEHOLDER: &str = "VALUE_SPECIFIED_IN_NO_LOG_PARAMETER";

/// Alternative spellings accepted for some arguments
const ALIASES: &[(&str, &str)] = &[
    ("verify", "validate_certs"),
    ("cacert", "ca_cert"),
    ("cert", "client_cert"),
    ("key", "client_key"),
    ("endpoint_type", "interface"),
];

/// How a raw argument value is converted before validation
#[derive(Debug, Clone, Copy)]
enum Conversion {
    Str,
    Int,
    Bool,
}

/// Scalar arguments and the type templated values are converted to
const CONVERSIONS: &[(&str, Conversion)] = &[
    ("name", Conversion::Str),
    ("availability_zone", Conversion::Str),
    ("cloud", Conversion::Str),
    ("region_name", Conversion::Str),
    ("ca_cert", Conversion::Str),
    ("client_cert", Conversion::Str),
    ("client_key", Conversion::Str),
    ("api_timeout", Conversion::Int),
    ("timeout", Conversion::Int),
    ("validate_certs", Conversion::Bool),
    ("wait", Conversion::Bool),
];

const DEFAULT_TIMEOUT: u64 = 180;

fn default_wait() -> bool {
    true
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT
}

/// Arguments of the router facts module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RouterFactsArgs {
    /// Name or id of the router
    pub name: Option<String>,
    /// Metadata to filter on. Elements may be nested mappings.
    pub filters: Option<Filters>,
    /// Ignored. Present for backwards compatibility.
    pub availability_zone: Option<String>,

    /// Named cloud from the clouds file
    pub cloud: Option<String>,
    pub auth: Option<AuthSection>,
    pub auth_type: Option<AuthType>,
    pub region_name: Option<String>,
    pub interface: Option<Interface>,
    pub validate_certs: Option<bool>,
    pub ca_cert: Option<PathBuf>,
    /// Client certificate (PEM) for mutual TLS
    pub client_cert: Option<PathBuf>,
    /// Private key (PEM) matching `client_cert`
    pub client_key: Option<PathBuf>,
    /// Per-request timeout in seconds
    pub api_timeout: Option<u64>,
    /// Accepted for compatibility with the module family; nothing to wait for
    #[serde(default = "default_wait")]
    pub wait: bool,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for RouterFactsArgs {
    fn default() -> Self {
        Self {
            name: None,
            filters: None,
            availability_zone: None,
            cloud: None,
            auth: None,
            auth_type: None,
            region_name: None,
            interface: None,
            validate_certs: None,
            ca_cert: None,
            client_cert: None,
            client_key: None,
            api_timeout: None,
            wait: default_wait(),
            timeout: default_timeout(),
        }
    }
}

impl RouterFactsArgs {
    /// Validate and parse the raw module arguments
    pub fn from_module_args(raw: &Value) -> ModuleResult<Self> {
        let object = raw.as_object().ok_or_else(|| {
            ModuleError::invalid_arguments("Module arguments must be a mapping")
        })?;

        let args = normalize(object)?;
        validate_schema(&args)?;

        serde_json::from_value(args).map_err(|e| {
            ModuleError::invalid_arguments(format!("Invalid module arguments: {e}"))
        })
    }

    /// Configuration layer contributed by the module arguments
    pub fn cloud_profile(&self) -> CloudProfile {
        CloudProfile {
            auth: self.auth.clone().unwrap_or_default(),
            auth_type: self.auth_type,
            region_name: self.region_name.clone(),
            interface: self.interface,
            verify: self.validate_certs,
            cacert: self.ca_cert.clone(),
            cert: self.client_cert.clone(),
            key: self.client_key.clone(),
            api_timeout: self.api_timeout,
        }
    }

    /// Values that must be masked wherever they would be echoed: every value
    /// of `auth` and the client key path
    pub fn no_log_values(&self) -> Vec<String> {
        let mut values = self
            .auth
            .as_ref()
            .map(AuthSection::values)
            .unwrap_or_default();
        values.extend(
            self.client_key
                .as_ref()
                .map(|path| path.display().to_string())
                .filter(|path| !path.is_empty()),
        );
        values
    }

    /// Arguments as echoed back under `invocation.module_args`
    pub fn invocation(&self) -> Value {
        let args = serde_json::to_value(self).unwrap_or(Value::Null);
        mask_value(args, &self.no_log_values())
    }
}

/// Replace no-log values anywhere in `value`. A string that is a no-log
/// value becomes the placeholder; one that merely contains one is masked in
/// place.
fn mask_value(value: Value, no_log_values: &[String]) -> Value {
    match value {
        Value::String(s) if no_log_values.contains(&s) => {
            Value::String(NO_LOG_PLACEHOLDER.to_string())
        }
        Value::String(s) => Value::String(mask_no_log(&s, no_log_values)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| mask_value(item, no_log_values))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, mask_value(item, no_log_values)))
                .collect(),
        ),
        other => other,
    }
}

/// Names of every supported argument, aliases included
pub fn supported_parameters() -> Vec<String> {
    let mut names: Vec<String> = argument_schema()
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default();
    names.extend(ALIASES.iter().map(|(alias, _)| alias.to_string()));
    names.sort();
    names
}

static ARGUMENT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::to_value(schemars::schema_for!(RouterFactsArgs)).unwrap_or(Value::Null)
});

/// JSON Schema of the module arguments
pub fn argument_schema() -> &'static Value {
    &ARGUMENT_SCHEMA
}

/// Drop engine-internal keys and nulls, resolve aliases, convert scalar
/// values and reject unknown keys
fn normalize(raw: &Map<String, Value>) -> ModuleResult<Value> {
    let supported = supported_parameters();
    let mut args = Map::new();
    let mut unsupported = Vec::new();

    for (key, value) in raw {
        if key.starts_with(INTERNAL_PREFIX) {
            continue;
        }
        if !supported.contains(key) {
            unsupported.push(key.clone());
            continue;
        }
        if value.is_null() {
            continue;
        }
        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| *alias == key.as_str())
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or_else(|| key.clone());
        if args.contains_key(&canonical) {
            return Err(ModuleError::invalid_arguments(format!(
                "Argument {canonical} was given more than once through its aliases"
            )));
        }
        let value = convert(&canonical, value.clone());
        args.insert(canonical, value);
    }

    if !unsupported.is_empty() {
        unsupported.sort();
        return Err(ModuleError::invalid_arguments(format!(
            "Unsupported parameters for ({MODULE_NAME}) module: {}. Supported parameters include: {}",
            unsupported.join(", "),
            supported.join(", ")
        )));
    }

    Ok(Value::Object(args))
}

/// Convert templated scalars the way the engine does for typed arguments.
/// Values that do not convert are left for schema validation to reject.
fn convert(key: &str, value: Value) -> Value {
    let Some((_, conversion)) = CONVERSIONS.iter().find(|(name, _)| *name == key) else {
        return value;
    };

    let converted = match (conversion, &value) {
        (Conversion::Str, Value::Number(n)) => Some(Value::String(n.to_string())),
        (Conversion::Str, Value::Bool(b)) => {
            Some(Value::String(if *b { "True" } else { "False" }.to_string()))
        }
        (Conversion::Int, Value::String(s)) => s.trim().parse::<u64>().ok().map(Value::from),
        (Conversion::Int, Value::Number(n)) if n.is_f64() => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
            .map(|f| Value::from(f as u64)),
        (Conversion::Bool, Value::String(s)) => parse_bool(s).map(Value::Bool),
        (Conversion::Bool, Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(Value::Bool(true)),
            Some(f) if f == 0.0 => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    };

    converted.unwrap_or(value)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "y" | "yes" | "on" | "1" | "true" | "t" => Some(true),
        "n" | "no" | "off" | "0" | "false" | "f" => Some(false),
        _ => None,
    }
}

fn validate_schema(args: &Value) -> ModuleResult<()> {
    let validator = jsonschema::validator_for(argument_schema()).map_err(|e| {
        ModuleError::invalid_arguments(format!("Argument schema compilation error: {e}"))
    })?;

    validator.validate(args).map_err(|errors| {
        let error_messages: Vec<String> = errors
            .map(|e| format!("At '{}': {}", e.instance_path, e))
            .collect();
        ModuleError::invalid_arguments(format!(
            "Parameter validation failed: {}",
            error_messages.join("; ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_arguments() {
        let args = RouterFactsArgs::from_module_args(&json!({})).unwrap();
        assert_eq!(args, RouterFactsArgs::default());
    }

    #[test]
    fn test_null_defaults_are_accepted() {
        let args =
            RouterFactsArgs::from_module_args(&json!({"name": null, "filters": null})).unwrap();
        assert_eq!(args.name, None);
        assert_eq!(args.filters, None);
    }

    #[test]
    fn test_name_and_nested_filters() {
        let args = RouterFactsArgs::from_module_args(&json!({
            "name": "router1",
            "filters": {"external_gateway_info": {"enable_snat": true}}
        }))
        .unwrap();

        assert_eq!(args.name.as_deref(), Some("router1"));
        assert_eq!(
            Value::Object(args.filters.unwrap()),
            json!({"external_gateway_info": {"enable_snat": true}})
        );
    }

    #[test]
    fn test_filters_must_be_mapping() {
        let err = RouterFactsArgs::from_module_args(&json!({"filters": "project_id=abc"}))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Parameter validation failed"));
        assert!(message.contains("/filters"));
    }

    #[test]
    fn test_unsupported_parameters() {
        let err = RouterFactsArgs::from_module_args(&json!({"nmae": "x", "color": "red"}))
            .unwrap_err();
        assert!(err.to_string().starts_with(
            "Unsupported parameters for (os_routers_facts) module: color, nmae."
        ));
    }

    #[test]
    fn test_internal_parameters_are_ignored() {
        let args = RouterFactsArgs::from_module_args(&json!({
            "name": "router1",
            "_ansible_check_mode": true,
            "_ansible_no_log": false
        }))
        .unwrap();
        assert_eq!(args.name.as_deref(), Some("router1"));
    }

    #[test]
    fn test_aliases() {
        let args =
            RouterFactsArgs::from_module_args(&json!({"verify": false, "cacert": "/etc/ca.pem"}))
                .unwrap();
        assert_eq!(args.validate_certs, Some(false));
        assert_eq!(args.ca_cert, Some(PathBuf::from("/etc/ca.pem")));

        let err = RouterFactsArgs::from_module_args(&json!({
            "verify": false,
            "validate_certs": true
        }))
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_unknown_auth_type_rejected() {
        let err =
            RouterFactsArgs::from_module_args(&json!({"auth_type": "saml2"})).unwrap_err();
        assert!(matches!(err, ModuleError::InvalidArguments(_)));
    }

    #[test]
    fn test_non_object_arguments() {
        let err = RouterFactsArgs::from_module_args(&json!(["name"])).unwrap_err();
        assert_eq!(err.to_string(), "Module arguments must be a mapping");
    }

    #[test]
    fn test_invocation_masks_every_auth_value() {
        let args = RouterFactsArgs::from_module_args(&json!({
            "auth": {
                "auth_url": "https://identity.example.com",
                "username": "user",
                "password": "hunter2"
            },
            "region_name": "RegionOne"
        }))
        .unwrap();

        let invocation = args.invocation();
        assert_eq!(invocation["auth"]["auth_url"], NO_LOG_PLACEHOLDER);
        assert_eq!(invocation["auth"]["username"], NO_LOG_PLACEHOLDER);
        assert_eq!(invocation["auth"]["password"], NO_LOG_PLACEHOLDER);
        assert!(invocation["auth"]["token"].is_null());
        assert_eq!(invocation["region_name"], "RegionOne");
        assert_eq!(
            args.no_log_values(),
            vec![
                "https://identity.example.com".to_string(),
                "user".to_string(),
                "hunter2".to_string(),
            ]
        );
    }

    #[test]
    fn test_invocation_masks_auth_values_in_other_arguments() {
        let args = RouterFactsArgs::from_module_args(&json!({
            "auth": {"username": "svc-neutron"},
            "name": "svc-neutron",
            "availability_zone": "az-of-svc-neutron",
            "client_key": "/etc/openstack/client.key"
        }))
        .unwrap();

        let invocation = args.invocation();
        assert_eq!(invocation["name"], NO_LOG_PLACEHOLDER);
        assert_eq!(invocation["availability_zone"], "az-of-********");
        assert_eq!(invocation["client_key"], NO_LOG_PLACEHOLDER);
    }

    #[test]
    fn test_family_defaults_are_echoed() {
        let args = RouterFactsArgs::from_module_args(&json!({"wait": null})).unwrap();

        assert!(args.wait);
        assert_eq!(args.timeout, 180);

        let invocation = args.invocation();
        assert_eq!(invocation["wait"], true);
        assert_eq!(invocation["timeout"], 180);
    }

    #[test]
    fn test_templated_scalars_are_converted() {
        let args = RouterFactsArgs::from_module_args(&json!({
            "name": 12345,
            "api_timeout": "30",
            "timeout": 60.0,
            "validate_certs": "yes",
            "wait": "off"
        }))
        .unwrap();

        assert_eq!(args.name.as_deref(), Some("12345"));
        assert_eq!(args.api_timeout, Some(30));
        assert_eq!(args.timeout, 60);
        assert_eq!(args.validate_certs, Some(true));
        assert!(!args.wait);

        let args = RouterFactsArgs::from_module_args(&json!({
            "name": true,
            "validate_certs": "No",
            "wait": 1
        }))
        .unwrap();
        assert_eq!(args.name.as_deref(), Some("True"));
        assert_eq!(args.validate_certs, Some(false));
        assert!(args.wait);
    }

    #[test]
    fn test_unconvertible_scalars_fail_validation() {
        let err = RouterFactsArgs::from_module_args(&json!({"api_timeout": "soon"}))
            .unwrap_err();
        assert!(err.to_string().contains("/api_timeout"));

        let err = RouterFactsArgs::from_module_args(&json!({"validate_certs": "maybe"}))
            .unwrap_err();
        assert!(err.to_string().contains("/validate_certs"));
    }

    #[test]
    fn test_client_certificate_and_endpoint_type_aliases() {
        let args = RouterFactsArgs::from_module_args(&json!({
            "cert": "/etc/openstack/client.pem",
            "key": "/etc/openstack/client.key",
            "endpoint_type": "internal"
        }))
        .unwrap();

        assert_eq!(args.client_cert, Some(PathBuf::from("/etc/openstack/client.pem")));
        assert_eq!(args.client_key, Some(PathBuf::from("/etc/openstack/client.key")));
        assert_eq!(args.interface, Some(Interface::Internal));

        let profile = args.cloud_profile();
        assert_eq!(profile.cert, Some(PathBuf::from("/etc/openstack/client.pem")));
        assert_eq!(profile.key, Some(PathBuf::from("/etc/openstack/client.key")));
    }

    #[test]
    fn test_cloud_profile_carries_connection_arguments() {
        let args = RouterFactsArgs::from_module_args(&json!({
            "region_name": "RegionOne",
            "interface": "internal",
            "validate_certs": false,
            "api_timeout": 20
        }))
        .unwrap();

        let profile = args.cloud_profile();
        assert_eq!(profile.region_name.as_deref(), Some("RegionOne"));
        assert_eq!(profile.interface, Some(Interface::Internal));
        assert_eq!(profile.verify, Some(false));
        assert_eq!(profile.api_timeout, Some(20));
    }

    #[test]
    fn test_supported_parameters_include_family_arguments() {
        let supported = supported_parameters();
        for name in [
            "name",
            "filters",
            "availability_zone",
            "auth",
            "cloud",
            "verify",
            "client_cert",
            "cert",
            "client_key",
            "key",
            "endpoint_type",
        ] {
            assert!(supported.iter().any(|s| s == name), "missing {name}");
        }
    }
}
