//! Per-connection capability filter.
//!
//! With no enabled-set configured everything is enabled. With a set, only
//! its members are. The filter gates both listing and invocation.

use std::collections::HashSet;

use crate::config::ConnectionConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityFilter {
    enabled_tools: Option<HashSet<String>>,
    enabled_resources: Option<HashSet<String>>,
}

impl CapabilityFilter {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            enabled_tools: config.enabled_tools.clone(),
            enabled_resources: config.enabled_resources.clone(),
        }
    }

    pub fn with_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_tools = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_resources<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_resources = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn tool_enabled(&self, name: &str) -> bool {
        self.enabled_tools
            .as_ref()
            .map_or(true, |set| set.contains(name))
    }

    pub fn resource_enabled(&self, name: &str) -> bool {
        self.enabled_resources
            .as_ref()
            .map_or(true, |set| set.contains(name))
    }

    pub fn is_restricted(&self) -> bool {
        self.enabled_tools.is_some() || self.enabled_resources.is_some()
    }
}
