use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::codec;

/// Cookie store of tabs that are not in any container.
pub const DEFAULT_COOKIE_STORE: &str = "firefox-default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub url: String,
    pub window_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_store_id: Option<String>,
}

impl Tab {
    /// Cookie store of the tab's container, or `None` for the default context.
    pub fn container_store(&self) -> Option<&str> {
        self.cookie_store_id
            .as_deref()
            .filter(|id| !id.is_empty() && *id != DEFAULT_COOKIE_STORE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub cookie_store_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
}

impl From<&Container> for ContainerInfo {
    fn from(container: &Container) -> Self {
        Self {
            id: codec::container_id(&container.name),
            name: container.name.clone(),
        }
    }
}

pub trait TabQuery: Send + Sync {
    /// Highlighted tabs across all windows.
    fn highlighted_tabs(&self) -> Result<Vec<Tab>>;
}

pub trait ContainerRegistry: Send + Sync {
    fn containers(&self) -> Result<Vec<Container>>;
}

/// Containers keyed by cookie store id.
#[derive(Debug, Clone, Default)]
pub struct ContainerIndex {
    by_store: HashMap<String, ContainerInfo>,
}

impl ContainerIndex {
    pub fn new(containers: &[Container]) -> Self {
        let mut by_store = HashMap::new();
        for container in containers {
            by_store
                .entry(container.cookie_store_id.clone())
                .or_insert_with(|| ContainerInfo::from(container));
        }
        Self { by_store }
    }

    pub fn get(&self, cookie_store_id: &str) -> Option<&ContainerInfo> {
        self.by_store.get(cookie_store_id)
    }

    pub fn len(&self) -> usize {
        self.by_store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_store.is_empty()
    }
}

/// Fixed tab list, for tests and offline scenarios.
#[derive(Debug, Clone, Default)]
pub struct StaticTabs(pub Vec<Tab>);

impl TabQuery for StaticTabs {
    fn highlighted_tabs(&self) -> Result<Vec<Tab>> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticContainers(pub Vec<Container>);

impl ContainerRegistry for StaticContainers {
    fn containers(&self) -> Result<Vec<Container>> {
        Ok(self.0.clone())
    }
}
