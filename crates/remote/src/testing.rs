// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory [`RemoteSession`] for tests.
//!
//! Flows are scripted up front: each `create_flow` consumes the next queued
//! [`FlowScript`] (or a plain successful one), and `wait_until_done` moves the
//! flow to the script's terminal state. A script may carry a gate so tests
//! can hold a flow in RUNNING until they release it.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::artifact::Artifact;
use crate::client::{OsFamily, RemoteClient};
use crate::error::{RemoteError, Result};
use crate::flow::{Flow, FlowArgs, FlowState};
use crate::results::{FlowResult, ResultPayload};
use crate::session::{ArchiveStream, RemoteSession};

/// How a scripted flow behaves
#[derive(Debug, Clone)]
pub struct FlowScript {
    pub final_state: FlowState,
    pub error: Option<String>,
    pub results: Vec<FlowResult>,
    pub archive: Option<Bytes>,
    pub timeline: Option<Bytes>,
    /// Waits take one permit before completing
    pub gate: Option<Arc<Semaphore>>,
}

impl Default for FlowScript {
    fn default() -> Self {
        Self {
            final_state: FlowState::Terminated,
            error: None,
            results: Vec::new(),
            archive: None,
            timeline: None,
            gate: None,
        }
    }
}

impl FlowScript {
    #[must_use]
    pub fn terminated() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            final_state: FlowState::Error,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_results(mut self, results: Vec<FlowResult>) -> Self {
        self.results = results;
        self
    }

    #[must_use]
    pub fn with_archive(mut self, archive: Vec<u8>) -> Self {
        self.archive = Some(Bytes::from(archive));
        self
    }

    #[must_use]
    pub fn with_timeline<B: Into<Bytes>>(mut self, body: B) -> Self {
        self.timeline = Some(body.into());
        self
    }

    #[must_use]
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[derive(Debug)]
struct FakeFlow {
    flow: Flow,
    script: FlowScript,
}

/// A filed approval request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRecord {
    pub client_id: String,
    pub reason: String,
    pub approvers: Vec<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    clients: Vec<RemoteClient>,
    approved: HashSet<String>,
    artifacts: Vec<Artifact>,
    flows: BTreeMap<String, FakeFlow>,
    pending: VecDeque<FlowScript>,
    created: Vec<FlowArgs>,
    approvals: Vec<ApprovalRecord>,
    next_id: u64,
    get_flow_calls: usize,
    list_flows_calls: usize,
    list_flows_failure: Option<String>,
    lookup_gate: Option<Arc<Semaphore>>,
}

#[derive(Debug, Default)]
pub struct FakeSession {
    state: Mutex<FakeState>,
}

/// An endpoint last seen now
#[must_use]
pub fn client(client_id: &str, hostname: &str, os: OsFamily) -> RemoteClient {
    RemoteClient {
        client_id: client_id.to_string(),
        hostname: hostname.to_string(),
        os,
        last_seen: Utc::now(),
    }
}

/// A timeline completion result
#[must_use]
pub fn timeline_result(timestamp: i64, filesystem_type: Option<&str>) -> FlowResult {
    FlowResult {
        timestamp,
        payload: ResultPayload::Timeline {
            filesystem_type: filesystem_type.map(str::to_string),
        },
    }
}

/// A flow record as the server would report it
#[must_use]
pub fn flow(flow_id: &str, client_id: &str, args: FlowArgs, state: FlowState) -> Flow {
    let now = Utc::now().timestamp_micros();
    Flow {
        flow_id: flow_id.to_string(),
        client_id: client_id.to_string(),
        name: args.flow_name().to_string(),
        args: Some(args),
        state,
        creator: "investigator".to_string(),
        started_at: now,
        last_active_at: now,
        error_description: None,
        status: None,
    }
}

impl FakeSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an endpoint, optionally approved for access
    #[must_use]
    pub fn with_client(self, client: RemoteClient, approved: bool) -> Self {
        {
            let mut state = self.state();
            if approved {
                _ = state.approved.insert(client.client_id.clone());
            }
            state.clients.push(client);
        }
        self
    }

    #[must_use]
    pub fn with_artifact(self, artifact: Artifact) -> Self {
        self.state().artifacts.push(artifact);
        self
    }

    /// Queue the behaviour of the next created flow
    pub fn script_next(&self, script: FlowScript) {
        self.state().pending.push_back(script);
    }

    /// Add a flow that was launched outside this session
    pub fn insert_flow(&self, flow: Flow, script: FlowScript) {
        _ = self
            .state()
            .flows
            .insert(flow.flow_id.clone(), FakeFlow { flow, script });
    }

    /// Change a flow's state as if the server had progressed it
    pub fn set_flow_state(&self, flow_id: &str, flow_state: FlowState) {
        if let Some(fake) = self.state().flows.get_mut(flow_id) {
            fake.flow.state = flow_state;
        }
    }

    /// Make every `list_flows` call fail with a transport error
    pub fn fail_list_flows<S: Into<String>>(&self, message: Option<S>) {
        self.state().list_flows_failure = message.map(Into::into);
    }

    /// Hold every `get_flow` until the gate has a permit.
    ///
    /// Permits are returned after each lookup, so one permit releases them
    /// all. Calls are counted before they wait.
    pub fn gate_lookups(&self, gate: Option<Arc<Semaphore>>) {
        self.state().lookup_gate = gate;
    }

    /// Arguments of every flow created, in order
    #[must_use]
    pub fn created_args(&self) -> Vec<FlowArgs> {
        self.state().created.clone()
    }

    #[must_use]
    pub fn approval_requests(&self) -> Vec<ApprovalRecord> {
        self.state().approvals.clone()
    }

    #[must_use]
    pub fn flow(&self, flow_id: &str) -> Option<Flow> {
        self.state().flows.get(flow_id).map(|f| f.flow.clone())
    }

    #[must_use]
    pub fn get_flow_calls(&self) -> usize {
        self.state().get_flow_calls
    }

    #[must_use]
    pub fn list_flows_calls(&self) -> usize {
        self.state().list_flows_calls
    }

    fn not_found(what: &str, id: &str) -> RemoteError {
        RemoteError::NotFound(format!("{what} {id}"))
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn search_clients(&self, query: &str) -> Result<Vec<RemoteClient>> {
        Ok(self
            .state()
            .clients
            .iter()
            .filter(|c| c.client_id == query || c.hostname.contains(query))
            .cloned()
            .collect())
    }

    async fn get_client(&self, client_id: &str) -> Result<RemoteClient> {
        self.state()
            .clients
            .iter()
            .find(|c| c.client_id == client_id)
            .cloned()
            .ok_or_else(|| Self::not_found("client", client_id))
    }

    async fn verify_access(&self, client_id: &str) -> Result<()> {
        if self.state().approved.contains(client_id) {
            Ok(())
        } else {
            Err(RemoteError::AccessForbidden(client_id.to_string()))
        }
    }

    async fn request_approval(
        &self,
        client_id: &str,
        reason: &str,
        approvers: &[String],
    ) -> Result<String> {
        let mut state = self.state();
        state.approvals.push(ApprovalRecord {
            client_id: client_id.to_string(),
            reason: reason.to_string(),
            approvers: approvers.to_vec(),
        });
        Ok(format!("approval:{}", state.approvals.len()))
    }

    async fn wait_approval(&self, client_id: &str, _approval_id: &str) -> Result<()> {
        _ = self.state().approved.insert(client_id.to_string());
        Ok(())
    }

    async fn create_flow(&self, client_id: &str, args: FlowArgs) -> Result<Flow> {
        let mut state = self.state();
        state.next_id += 1;
        let flow_id = format!("F{:06X}", state.next_id);
        let script = state.pending.pop_front().unwrap_or_default();

        let mut created = flow(&flow_id, client_id, args.clone(), FlowState::Running);
        // Strictly increasing start times keep newest-first ordering stable
        created.started_at += i64::try_from(state.next_id).unwrap_or_default();

        state.created.push(args);
        _ = state.flows.insert(
            flow_id,
            FakeFlow {
                flow: created.clone(),
                script,
            },
        );
        Ok(created)
    }

    async fn get_flow(&self, _client_id: &str, flow_id: &str) -> Result<Flow> {
        let gate = {
            let mut state = self.state();
            state.get_flow_calls += 1;
            state.lookup_gate.clone()
        };
        if let Some(gate) = gate {
            _ = gate
                .acquire()
                .await
                .map_err(|e| RemoteError::Transport(e.to_string()))?;
        }

        self.state()
            .flows
            .get(flow_id)
            .map(|f| f.flow.clone())
            .ok_or_else(|| Self::not_found("flow", flow_id))
    }

    async fn list_flows(&self, client_id: &str) -> Result<Vec<Flow>> {
        let mut state = self.state();
        state.list_flows_calls += 1;
        if let Some(message) = &state.list_flows_failure {
            return Err(RemoteError::Transport(message.clone()));
        }
        Ok(state
            .flows
            .values()
            .filter(|f| f.flow.client_id == client_id)
            .map(|f| f.flow.clone())
            .collect())
    }

    async fn wait_until_done(&self, _client_id: &str, flow_id: &str) -> Result<Flow> {
        let gate = self
            .state()
            .flows
            .get(flow_id)
            .ok_or_else(|| Self::not_found("flow", flow_id))?
            .script
            .gate
            .clone();

        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| RemoteError::Transport(e.to_string()))?;
            permit.forget();
        }

        let mut state = self.state();
        let fake = state
            .flows
            .get_mut(flow_id)
            .ok_or_else(|| Self::not_found("flow", flow_id))?;

        if fake.flow.state == FlowState::Running {
            fake.flow.state = fake.script.final_state;
            fake.flow.last_active_at = Utc::now().timestamp_micros();
            if fake.flow.state == FlowState::Error {
                fake.flow.error_description = fake.script.error.clone();
            }
        }

        match fake.flow.state {
            FlowState::Error => Err(RemoteError::FlowFailed {
                flow_id: flow_id.to_string(),
                message: fake
                    .flow
                    .error_description
                    .clone()
                    .unwrap_or_else(|| "flow failed".to_string()),
            }),
            _ => Ok(fake.flow.clone()),
        }
    }

    async fn list_results(&self, _client_id: &str, flow_id: &str) -> Result<Vec<FlowResult>> {
        self.state()
            .flows
            .get(flow_id)
            .map(|f| f.script.results.clone())
            .ok_or_else(|| Self::not_found("flow", flow_id))
    }

    async fn files_archive(&self, _client_id: &str, flow_id: &str) -> Result<ArchiveStream> {
        let archive = self
            .state()
            .flows
            .get(flow_id)
            .and_then(|f| f.script.archive.clone())
            .ok_or_else(|| Self::not_found("archive for flow", flow_id))?;

        // Deliver in two chunks so readers cannot assume a single buffer
        let mid = archive.len() / 2;
        let chunks = vec![Ok(archive.slice(..mid)), Ok(archive.slice(mid..))];
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn timeline_body(&self, _client_id: &str, flow_id: &str) -> Result<Bytes> {
        self.state()
            .flows
            .get(flow_id)
            .and_then(|f| f.script.timeline.clone())
            .ok_or_else(|| Self::not_found("timeline for flow", flow_id))
    }

    async fn list_artifacts(&self) -> Result<Vec<Artifact>> {
        Ok(self.state().artifacts.clone())
    }
}

/// Start time `hours` ago, in microseconds
#[must_use]
pub fn hours_ago(hours: i64) -> i64 {
    (Utc::now() - chrono::Duration::hours(hours)).timestamp_micros()
}
