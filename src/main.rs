//! os_routers_facts - Main Entry Point
//!
//! Runs as an Ansible binary module: reads the arguments file, looks up the
//! routers and prints the result object on stdout.

use clap::Parser;
use os_routers_facts::module::{self, ModuleResponse};
use os_routers_facts::observability::init_default_logging;
use os_routers_facts::OpenStackConnector;
use std::path::PathBuf;
use std::process;
use tracing::{debug, error};

/// Retrieve facts about one or more OpenStack routers
#[derive(Parser)]
#[command(name = "os-routers-facts")]
#[command(about = "Retrieve facts about one or more OpenStack routers")]
#[command(version)]
struct Cli {
    /// JSON arguments file written by Ansible; stdin when omitted
    #[arg(value_name = "ARGS_FILE")]
    args_file: Option<PathBuf>,

    /// TOML clouds file used to resolve the `cloud` argument
    #[arg(long, value_name = "FILE", env = "OS_CLIENT_CONFIG_FILE")]
    clouds_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    debug!(
        "Starting os_routers_facts v{}",
        env!("CARGO_PKG_VERSION")
    );

    let response = match module::read_module_input(cli.args_file.as_deref()) {
        Ok(input) => {
            module::run(
                &input,
                &OpenStackConnector::new(),
                cli.clouds_file.as_deref(),
                |name| std::env::var(name).ok(),
            )
            .await
        }
        Err(e) => {
            error!("Failed to read module arguments: {}", e);
            ModuleResponse::new(e.into_outcome())
        }
    };

    println!("{}", response.to_json());
    process::exit(response.exit_code());
}
