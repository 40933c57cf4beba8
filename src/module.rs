//! Ansible binary module calling convention
//!
//! The engine writes the arguments to a JSON file, runs the module with the
//! file path as its only argument and reads one JSON object from stdout:
//!
//! - success: `{"changed": false, "ansible_facts": {"openstack_routers": [...]}}`
//! - failure: `{"failed": true, "msg": "..."}`
//!
//! Both carry `invocation.module_args` with no-log values masked.

use crate::cloud::{CloudConnector, Router};
use crate::config::CloudConfig;
use crate::error::{ModuleError, ModuleResult};
use crate::facts;
use crate::params::RouterFactsArgs;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, Instrument};

/// Key under which the routers are published as facts
pub const FACTS_KEY: &str = "openstack_routers";

/// Key wrapping the arguments in the args file written by the engine
const MODULE_ARGS_KEY: &str = "ANSIBLE_MODULE_ARGS";

/// Replacement for no-log values found inside messages
const MASK: &str = "********";

/// Outcome of one module invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleOutcome {
    /// Search succeeded; `None` when the cloud reported null for "nothing found"
    Success { routers: Option<Vec<Router>> },
    Failure { msg: String },
}

impl ModuleOutcome {
    pub fn success(routers: Option<Vec<Router>>) -> Self {
        Self::Success { routers }
    }

    pub fn failure<S: Into<String>>(msg: S) -> Self {
        Self::Failure { msg: msg.into() }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// Outcome plus the context needed to print it
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleResponse {
    pub outcome: ModuleOutcome,
    pub invocation: Option<Value>,
    no_log_values: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ModuleOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    changed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ansible_facts: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    invocation: Option<Invocation<'a>>,
}

#[derive(Debug, Serialize)]
struct Invocation<'a> {
    module_args: &'a Value,
}

impl ModuleResponse {
    pub fn new(outcome: ModuleOutcome) -> Self {
        Self {
            outcome,
            invocation: None,
            no_log_values: Vec::new(),
        }
    }

    /// Attach the echoed arguments and the secrets to mask
    pub fn with_args(mut self, args: &RouterFactsArgs) -> Self {
        self.invocation = Some(args.invocation());
        self.no_log_values = args.no_log_values();
        self
    }

    pub fn exit_code(&self) -> i32 {
        if self.outcome.is_failure() {
            1
        } else {
            0
        }
    }

    /// Result object as printed on stdout
    pub fn to_json(&self) -> Value {
        let invocation = self
            .invocation
            .as_ref()
            .map(|module_args| Invocation { module_args });

        let output = match &self.outcome {
            ModuleOutcome::Success { routers } => {
                let mut facts = Map::new();
                facts.insert(
                    FACTS_KEY.to_string(),
                    routers
                        .as_ref()
                        .map_or(Value::Null, |r| Value::Array(r.clone())),
                );
                ModuleOutput {
                    changed: Some(false),
                    failed: None,
                    msg: None,
                    ansible_facts: Some(facts),
                    invocation,
                }
            }
            ModuleOutcome::Failure { msg } => ModuleOutput {
                changed: None,
                failed: Some(true),
                msg: Some(mask_no_log(msg, &self.no_log_values)),
                ansible_facts: None,
                invocation,
            },
        };

        serde_json::to_value(output).unwrap_or(Value::Null)
    }
}

/// Replace every occurrence of a no-log value in `msg`
pub fn mask_no_log(msg: &str, no_log_values: &[String]) -> String {
    no_log_values
        .iter()
        .filter(|v| !v.is_empty())
        .fold(msg.to_string(), |acc, secret| acc.replace(secret.as_str(), MASK))
}

/// Extract the module arguments from the args file contents
pub fn parse_module_args(input: &str) -> ModuleResult<Value> {
    let mut value: Value = if input.trim().is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_str(input)?
    };

    match value.get_mut(MODULE_ARGS_KEY) {
        Some(args) => Ok(args.take()),
        None => Ok(value),
    }
}

/// Read the args file, or stdin when no path is given
pub fn read_module_input(path: Option<&Path>) -> ModuleResult<String> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut input = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut input)?;
            Ok(input)
        }
    }
}

/// Run the module end to end on raw args file contents.
///
/// `env` resolves `OS_*` variables so callers control the environment.
pub async fn run<K, F>(
    input: &str,
    connector: &K,
    clouds_file: Option<&Path>,
    env: F,
) -> ModuleResponse
where
    K: CloudConnector + ?Sized,
    F: Fn(&str) -> Option<String>,
{
    let args = match parse_module_args(input).and_then(|raw| RouterFactsArgs::from_module_args(&raw)) {
        Ok(args) => args,
        Err(e) => return ModuleResponse::new(e.into_outcome()),
    };

    let span = crate::module_span!(
        name = ?args.name,
        has_filters = args.filters.is_some(),
        cloud = ?args.cloud
    );

    let outcome = async {
        let config = match resolve_config(&args, clouds_file, &env) {
            Ok(config) => config,
            Err(e) => return e.into_outcome(),
        };
        debug!(
            "Resolved cloud config: auth_type={}, interface={}, region={:?}",
            config.auth_type.as_str(),
            config.interface.as_str(),
            config.region_name
        );
        facts::collect(connector, &config, &args).await
    }
    .instrument(span)
    .await;

    ModuleResponse::new(outcome).with_args(&args)
}

fn resolve_config<F>(
    args: &RouterFactsArgs,
    clouds_file: Option<&Path>,
    env: F,
) -> ModuleResult<CloudConfig>
where
    F: Fn(&str) -> Option<String>,
{
    CloudConfig::load(args.cloud_profile(), args.cloud.as_deref(), clouds_file, env)
        .map_err(ModuleError::from)
}
