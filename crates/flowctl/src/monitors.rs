// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Background polling caches over the remote session.
//!
//! Each monitor owns one lock around its cache. The lock is held only while
//! the cache is read or merged; remote round trips run outside it, so a
//! foreground reader never waits on the network.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diagnostics::*;
use remote::{Flow, RemoteSession};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// A cache refreshed by repeated single fetches
#[async_trait]
pub trait Monitor: Send + Sync {
    /// Refresh the cache once; failures are logged and swallowed
    async fn single_fetch(&self);
}

/// Run `monitor` every `interval` until `cancel` fires
pub fn spawn_monitor<M>(
    monitor: Arc<M>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    M: Monitor + ?Sized + 'static,
{
    tokio::spawn(async move {
        loop {
            monitor.single_fetch().await;
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }
        debug!("Monitor stopped");
    })
}

/// Cached last-seen time of the endpoint
pub struct LastSeenMonitor {
    session: Arc<dyn RemoteSession>,
    client_id: String,
    last_seen: Mutex<DateTime<Utc>>,
}

impl LastSeenMonitor {
    #[must_use]
    pub fn new(session: Arc<dyn RemoteSession>, client_id: &str, initial: DateTime<Utc>) -> Self {
        Self {
            session,
            client_id: client_id.to_string(),
            last_seen: Mutex::new(initial),
        }
    }

    pub async fn last_seen(&self) -> DateTime<Utc> {
        *self.last_seen.lock().await
    }
}

#[async_trait]
impl Monitor for LastSeenMonitor {
    async fn single_fetch(&self) {
        match self.session.get_client(&self.client_id).await {
            Ok(client) => *self.last_seen.lock().await = client.last_seen,
            Err(e) => {
                warn!("Last seen refresh for {client} failed: {error}", client: self.client_id.clone(), error: e.to_string());
            }
        }
    }
}

/// Cached view of every flow on the endpoint
pub struct FlowMonitor {
    session: Arc<dyn RemoteSession>,
    client_id: String,
    flows: Mutex<BTreeMap<String, Flow>>,
}

impl FlowMonitor {
    #[must_use]
    pub fn new(session: Arc<dyn RemoteSession>, client_id: &str) -> Self {
        Self {
            session,
            client_id: client_id.to_string(),
            flows: Mutex::new(BTreeMap::new()),
        }
    }

    /// Re-read one flow into the cache, keeping the cached copy on failure
    async fn refresh(&self, flow_id: &str) -> Result<Flow> {
        debug!("Refreshing flow {flow_id}", flow_id: flow_id.to_string());
        let flow = self.session.get_flow(&self.client_id, flow_id).await?;
        let mut flows = self.flows.lock().await;
        merge(&mut flows, flow);
        flows
            .get(flow_id)
            .cloned()
            .ok_or_else(|| crate::FlowctlError::runtime(format!("Flow {flow_id} vanished from cache")))
    }

    /// The flow, re-fetched first if uncached or possibly out of date
    pub async fn get_flow(&self, flow_id: &str) -> Result<Flow> {
        let cached = self.flows.lock().await.get(flow_id).cloned();
        match cached {
            Some(flow) if !flow.needs_refresh() => Ok(flow),
            _ => self.refresh(flow_id).await,
        }
    }

    /// The `count` most recently started flows, newest first
    pub async fn list_recent(&self, count: usize) -> Vec<Flow> {
        let flows = self.flows.lock().await;
        let mut recent: Vec<Flow> = flows.values().cloned().collect();
        recent.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        recent.truncate(count);
        recent
    }

    /// Cache a flow the monitor has not discovered itself
    pub async fn track(&self, flow: Flow) {
        let mut flows = self.flows.lock().await;
        _ = flows.entry(flow.flow_id.clone()).or_insert(flow);
    }

    /// Replace the cached copy with a newer snapshot
    pub async fn update(&self, flow: Flow) {
        merge(&mut *self.flows.lock().await, flow);
    }

    pub async fn len(&self) -> usize {
        self.flows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.flows.lock().await.is_empty()
    }
}

/// Store a fetched snapshot unless the cache already holds a terminal one
/// that a slower fetch would roll back
fn merge(flows: &mut BTreeMap<String, Flow>, flow: Flow) {
    if flows
        .get(&flow.flow_id)
        .is_some_and(|cached| !cached.needs_refresh() && flow.needs_refresh())
    {
        return;
    }
    _ = flows.insert(flow.flow_id.clone(), flow);
}

#[async_trait]
impl Monitor for FlowMonitor {
    async fn single_fetch(&self) {
        let listed = self.session.list_flows(&self.client_id).await;

        let stale: Vec<String> = {
            let mut flows = self.flows.lock().await;
            match listed {
                Ok(listed) => {
                    for flow in listed {
                        if !flows.contains_key(&flow.flow_id) {
                            _ = flows.insert(flow.flow_id.clone(), flow);
                        }
                    }
                }
                Err(e) => {
                    warn!("Flow listing for {client} failed: {error}", client: self.client_id.clone(), error: e.to_string());
                }
            }
            flows
                .values()
                .filter(|f| f.needs_refresh())
                .map(|f| f.flow_id.clone())
                .collect()
        };

        for flow_id in stale {
            if let Err(e) = self.refresh(&flow_id).await {
                warn!("Refresh of flow {flow_id} failed: {error}", flow_id: flow_id.clone(), error: e.to_string());
            }
        }
    }
}
