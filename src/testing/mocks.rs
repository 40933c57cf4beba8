//! Mock implementations for testing
//!
//! Provides a mock cloud client and connector so the fact collector can be
//! exercised without a cloud.

use crate::cloud::{CloudClient, CloudConnector, CloudError, Filters, Router};
use crate::config::CloudConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One recorded `search_routers` call
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCall {
    pub name: Option<String>,
    pub filters: Option<Filters>,
}

/// Mock cloud returning a canned answer and recording every search
#[derive(Debug, Clone)]
pub struct MockCloud {
    response: Result<Option<Vec<Router>>, CloudError>,
    calls: Arc<Mutex<Vec<SearchCall>>>,
}

impl MockCloud {
    pub fn returning(routers: Vec<Router>) -> Self {
        Self::with_response(Ok(Some(routers)))
    }

    /// Cloud answering null instead of an empty list
    pub fn returning_none() -> Self {
        Self::with_response(Ok(None))
    }

    pub fn failing(error: CloudError) -> Self {
        Self::with_response(Err(error))
    }

    fn with_response(response: Result<Option<Vec<Router>>, CloudError>) -> Self {
        Self {
            response,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn calls(&self) -> Vec<SearchCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl CloudClient for MockCloud {
    async fn search_routers(
        &self,
        name: Option<&str>,
        filters: Option<&Filters>,
    ) -> Result<Option<Vec<Router>>, CloudError> {
        self.calls.lock().await.push(SearchCall {
            name: name.map(str::to_string),
            filters: filters.cloned(),
        });
        self.response.clone()
    }
}

/// Mock connector handing out a shared [`MockCloud`]
#[derive(Debug, Clone)]
pub struct MockConnector {
    cloud: MockCloud,
    connect_error: Option<CloudError>,
    configs: Arc<Mutex<Vec<CloudConfig>>>,
}

impl MockConnector {
    pub fn new(cloud: MockCloud) -> Self {
        Self {
            cloud,
            connect_error: None,
            configs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Connector whose `connect` always fails
    pub fn failing(error: CloudError) -> Self {
        Self {
            connect_error: Some(error),
            ..Self::new(MockCloud::returning(Vec::new()))
        }
    }

    pub fn cloud(&self) -> &MockCloud {
        &self.cloud
    }

    /// Configurations passed to `connect`
    pub async fn configs(&self) -> Vec<CloudConfig> {
        self.configs.lock().await.clone()
    }
}

#[async_trait]
impl CloudConnector for MockConnector {
    type Client = MockCloud;

    async fn connect(&self, config: &CloudConfig) -> Result<MockCloud, CloudError> {
        self.configs.lock().await.push(config.clone());
        match &self.connect_error {
            Some(error) => Err(error.clone()),
            None => Ok(self.cloud.clone()),
        }
    }
}
