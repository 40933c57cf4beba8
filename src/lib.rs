//! OpenStack router facts
//!
//! An Ansible binary module that looks up OpenStack routers and publishes
//! them as the `openstack_routers` fact.
//!
//! # Overview
//!
//! - [`params`]: module arguments and their validation
//! - [`config`]: explicit cloud configuration from arguments, clouds file and `OS_*` variables
//! - [`cloud`]: the cloud client seam and its Keystone/Neutron implementation
//! - [`facts`]: the fact collector
//! - [`module`]: the engine calling convention and result object
//!
//! # Quick Start
//!
//! ```rust
//! use os_routers_facts::facts::gather_router_facts;
//! use os_routers_facts::module::{ModuleOutcome, ModuleResponse};
//! use os_routers_facts::params::RouterFactsArgs;
//! use os_routers_facts::testing::MockCloud;
//! use serde_json::json;
//!
//! # tokio_test_block_on(async {
//! let cloud = MockCloud::returning(vec![json!({"id": "abc", "name": "router1"})]);
//! let args = RouterFactsArgs {
//!     name: Some("router1".to_string()),
//!     ..Default::default()
//! };
//!
//! let outcome = gather_router_facts(&cloud, &args).await;
//! let output = ModuleResponse::new(outcome).to_json();
//!
//! assert_eq!(output["changed"], false);
//! assert_eq!(output["ansible_facts"]["openstack_routers"][0]["id"], "abc");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod cloud;
pub mod config;
pub mod error;
pub mod facts;
pub mod module;
pub mod observability;
pub mod params;
pub mod testing;

pub use cloud::{CloudClient, CloudConnector, CloudError, OpenStackCloud, OpenStackConnector};
pub use config::{CloudConfig, ConfigError};
pub use error::{ModuleError, ModuleResult};
pub use module::{ModuleOutcome, ModuleResponse, FACTS_KEY};
pub use params::RouterFactsArgs;
