//! Router fact collector
//!
//! Obtains a cloud handle, performs one router search and shapes the answer
//! into a [`ModuleOutcome`]. No writes, no retries: whatever the cloud
//! client returns or raises is reported as is.

use crate::cloud::{CloudClient, CloudConnector};
use crate::config::CloudConfig;
use crate::module::ModuleOutcome;
use crate::params::RouterFactsArgs;
use tracing::{debug, info, warn};

/// Search routers on an already connected cloud handle
pub async fn gather_router_facts<C>(cloud: &C, args: &RouterFactsArgs) -> ModuleOutcome
where
    C: CloudClient + ?Sized,
{
    match cloud
        .search_routers(args.name.as_deref(), args.filters.as_ref())
        .await
    {
        Ok(routers) => {
            match &routers {
                Some(found) => info!("Found {} router(s)", found.len()),
                None => debug!("Cloud reported no routers"),
            }
            ModuleOutcome::success(routers)
        }
        Err(e) => {
            warn!("Router search failed: {}", e);
            ModuleOutcome::failure(e.to_string())
        }
    }
}

/// Connect with `connector` and gather router facts
pub async fn collect<K>(connector: &K, config: &CloudConfig, args: &RouterFactsArgs) -> ModuleOutcome
where
    K: CloudConnector + ?Sized,
{
    if args.availability_zone.is_some() {
        debug!("Ignoring availability_zone, kept for backwards compatibility");
    }

    let cloud = match connector.connect(config).await {
        Ok(cloud) => cloud,
        Err(e) => {
            warn!("Failed to connect to the cloud: {}", e);
            return ModuleOutcome::failure(e.to_string());
        }
    };

    gather_router_facts(&cloud, args).await
}
