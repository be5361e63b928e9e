// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Session tuning, loadable from YAML; missing keys take defaults
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Concurrent background waits
    pub worker_budget: usize,
    /// Sleep between monitor fetches
    pub monitor_interval_secs: u64,
    /// Per-file collection cap; 0 keeps the server default
    pub max_collect_size: u64,
    /// Root timelines older than this are not reused
    pub stale_timeline_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_budget: 40,
            monitor_interval_secs: 60,
            max_collect_size: 0,
            stale_timeline_hours: 12,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    #[must_use]
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    #[must_use]
    pub fn stale_timeline(&self) -> chrono::Duration {
        chrono::Duration::hours(self.stale_timeline_hours)
    }

    /// The collection cap, or `None` for the server default
    #[must_use]
    pub fn collect_cap(&self) -> Option<u64> {
        (self.max_collect_size > 0).then_some(self.max_collect_size)
    }
}
