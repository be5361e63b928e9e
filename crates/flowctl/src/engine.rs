// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! The flow orchestration engine for one endpoint.
//!
//! All session state lives on the [`Engine`]: the launched-flow table, the
//! addressing-mode cache, the artifact catalog and both monitors. Long waits
//! run either in the caller or on the [`WorkerPool`]; status queries only
//! read cached snapshots plus a refresh of flows last seen RUNNING.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use diagnostics::*;
use remote::{
    Artifact, FileFinderAction, Flow, FlowArgs, FlowState, OsFamily, PathSpec, PathType,
    RemoteClient, RemoteSession, ResultPayload,
};
use snapfs::{EmulatedFs, readable_timestamp};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::classify::{Execution, RESUMABLE_FLOWS, classify_artifact, classify_flow};
use crate::config::EngineConfig;
use crate::display::{flow_args_lines, format_flow_results};
use crate::monitors::{FlowMonitor, LastSeenMonitor, spawn_monitor};
use crate::pathspec::PathSpecMapper;
use crate::pool::{TaskHandle, WorkerPool};
use crate::unpack::{prepare_output_dir, resolve_local_dir, unpack_flow_results};
use crate::{FlowctlError, Result};

const TIMELINE_FLOW: &str = "TimelineFlow";
const ADS_STREAM: &str = "Zone.Identifier";

type Catalog = Arc<Mutex<Option<BTreeMap<String, Artifact>>>>;

/// A flow this session handed to the worker pool
#[derive(Debug)]
struct LaunchedFlow {
    flow: Flow,
    handle: TaskHandle,
    error_reported: bool,
}

/// Background flows of this session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowCounts {
    /// Queued or still waiting/unpacking
    pub running: usize,
    pub total: usize,
}

/// Files written by a collection waited on in the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    pub files: Vec<PathBuf>,
    /// `Flow {id} failed: {message}` when the remote flow ended in error
    pub failure: Option<String>,
}

impl Collected {
    fn failed(flow_id: &str, message: &str) -> Self {
        Self {
            files: Vec::new(),
            failure: Some(flow_failure_line(flow_id, message)),
        }
    }

    /// Written paths, or the failure line
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        match &self.failure {
            Some(line) => vec![line.clone()],
            None => self.files.iter().map(|p| p.display().to_string()).collect(),
        }
    }
}

fn flow_failure_line(flow_id: &str, message: &str) -> String {
    let line = format!("Flow {flow_id} failed: {message}");
    warn!("{line}", line: line.clone());
    line
}

pub struct Engine {
    session: Arc<dyn RemoteSession>,
    client: RemoteClient,
    config: EngineConfig,
    max_collect_size: AtomicU64,
    mapper: PathSpecMapper,
    catalog: Catalog,
    flow_monitor: Arc<FlowMonitor>,
    last_seen: Arc<LastSeenMonitor>,
    cancel: CancellationToken,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
    pool: WorkerPool,
    launched: Mutex<BTreeMap<String, LaunchedFlow>>,
}

/// File an approval request for `client_id` and wait until it is granted
pub async fn request_approval(
    session: &dyn RemoteSession,
    client_id: &str,
    reason: &str,
    approvers: &[String],
) -> Result<String> {
    let approval_id = session.request_approval(client_id, reason, approvers).await?;
    info!("Approval request {approval_id} sent for {client_id}", approval_id: approval_id.clone(), client_id: client_id.to_string());
    session.wait_approval(client_id, &approval_id).await?;
    info!("Approval received for {client_id}", client_id: client_id.to_string());
    Ok(approval_id)
}

/// Resolve a hostname or id to exactly one endpoint
async fn resolve_client(session: &dyn RemoteSession, query: &str) -> Result<String> {
    debug!("Resolving client identifier: {query}", query: query.to_string());
    let matches = session.search_clients(query).await?;
    match matches.as_slice() {
        [only] => {
            debug!("Client identifier resolved to: {client}", client: only.client_id.clone());
            Ok(only.client_id.clone())
        }
        _ => Err(FlowctlError::ClientNotFound {
            query: query.to_string(),
            matches: matches.len(),
        }),
    }
}

/// Fill the catalog with artifacts supported on `os`, once
async fn load_catalog(session: &dyn RemoteSession, os: OsFamily, catalog: &Catalog) -> Result<()> {
    let mut guard = catalog.lock().await;
    if guard.is_none() {
        debug!("Fetching supported artefacts");
        let artifacts: BTreeMap<String, Artifact> = session
            .list_artifacts()
            .await?
            .into_iter()
            .filter(|a| a.supports(os))
            .map(|a| (a.name.clone(), a))
            .collect();
        debug!("{count} supported artefacts collected", count: artifacts.len());
        *guard = Some(artifacts);
    }
    Ok(())
}

/// Wait for a flow, then unpack its archive under `local_dir`
async fn wait_and_unpack(
    session: Arc<dyn RemoteSession>,
    client_id: String,
    flow: Flow,
    mode: PathType,
    local_dir: PathBuf,
) -> Result<Vec<PathBuf>> {
    debug!("Waiting for flow: {flow_id}", flow_id: flow.flow_id.clone());
    let done = session.wait_until_done(&client_id, &flow.flow_id).await?;
    debug!("Completed flow: {flow_id}", flow_id: done.flow_id.clone());

    let cwd = std::env::current_dir()?;
    let local = resolve_local_dir(&local_dir, &cwd, &client_id);
    let local = prepare_output_dir(&local)?;
    unpack_flow_results(session.as_ref(), &client_id, &done, mode, &local).await
}

/// A bare drive such as `C:` or `/C:`, with no trailing separator
fn is_drive_root(path: &str) -> bool {
    let drive = path.strip_prefix('/').unwrap_or(path);
    matches!(drive.as_bytes(), [letter, b':'] if letter.is_ascii_alphabetic())
}

/// Roots whose timelines can stand in for the whole filesystem
fn is_root_timeline(root: &str) -> bool {
    let drive = root.strip_prefix('/').unwrap_or(root);
    root == "/"
        || matches!(drive.as_bytes(), [letter, b':', b'/' | b'\\'] if letter.is_ascii_uppercase())
}

impl Engine {
    /// Connect to the endpoint named by `identifier` and start the monitors.
    ///
    /// Fails with `ClientNotFound` unless exactly one endpoint matches and
    /// with `NoApproval` when access has not been granted.
    pub async fn connect(
        session: Arc<dyn RemoteSession>,
        identifier: &str,
        config: EngineConfig,
    ) -> Result<Self> {
        let client_id = resolve_client(session.as_ref(), identifier).await?;
        let client = session.get_client(&client_id).await?;
        session.verify_access(&client_id).await?;
        info!("Connected to {client_id} ({os})", client_id: client_id.clone(), os: client.os.as_str());

        let flow_monitor = Arc::new(FlowMonitor::new(session.clone(), &client_id));
        let last_seen = Arc::new(LastSeenMonitor::new(
            session.clone(),
            &client_id,
            client.last_seen,
        ));
        let cancel = CancellationToken::new();
        let catalog: Catalog = Arc::new(Mutex::new(None));

        let interval = config.monitor_interval();
        let mut tasks = vec![
            spawn_monitor(flow_monitor.clone(), interval, cancel.clone()),
            spawn_monitor(last_seen.clone(), interval, cancel.clone()),
        ];
        {
            let session = session.clone();
            let catalog = catalog.clone();
            let os = client.os;
            tasks.push(tokio::spawn(async move {
                if let Err(e) = load_catalog(session.as_ref(), os, &catalog).await {
                    warn!("Artefact catalog load failed: {error}", error: e.to_string());
                }
            }));
        }

        Ok(Self {
            session,
            max_collect_size: AtomicU64::new(config.max_collect_size),
            pool: WorkerPool::new(config.worker_budget),
            client,
            config,
            mapper: PathSpecMapper::new(),
            catalog,
            flow_monitor,
            last_seen,
            cancel,
            tasks: StdMutex::new(tasks),
            launched: Mutex::new(BTreeMap::new()),
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client.client_id
    }

    #[must_use]
    pub fn os(&self) -> OsFamily {
        self.client.os
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.client.hostname
    }

    #[must_use]
    pub fn path_mapper(&self) -> &PathSpecMapper {
        &self.mapper
    }

    pub async fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen.last_seen().await
    }

    /// Change the per-file collection cap; 0 restores the server default
    pub fn set_max_collect_size(&self, size: u64) {
        self.max_collect_size.store(size, Ordering::Relaxed);
    }

    fn collect_cap(&self) -> Option<u64> {
        let size = self.max_collect_size.load(Ordering::Relaxed);
        (size > 0).then_some(size)
    }

    fn windows(&self) -> bool {
        self.client.os.is_windows()
    }

    /// Windows endpoints are addressed without the emulated leading slash
    fn remote_path<'a>(&self, path: &'a str) -> &'a str {
        if self.windows() {
            path.strip_prefix('/').unwrap_or(path)
        } else {
            path
        }
    }

    async fn with_catalog<T>(&self, f: impl FnOnce(&BTreeMap<String, Artifact>) -> T) -> Result<T> {
        load_catalog(self.session.as_ref(), self.client.os, &self.catalog).await?;
        let guard = self.catalog.lock().await;
        let empty = BTreeMap::new();
        Ok(f(guard.as_ref().unwrap_or(&empty)))
    }

    /// Names of artifacts supported on this endpoint, sorted
    pub async fn supported_artifact_names(&self) -> Result<Vec<String>> {
        self.with_catalog(|catalog| catalog.keys().cloned().collect())
            .await
    }

    fn file_finder_args(&self, remote_path: &str, action: FileFinderAction) -> FlowArgs {
        let path = self.remote_path(remote_path);
        let max_size = match action {
            FileFinderAction::Hash | FileFinderAction::Download => self.collect_cap(),
            FileFinderAction::Stat => None,
        };
        FlowArgs::FileFinder {
            paths: vec![path.to_string()],
            action,
            pathtype: self.mapper.lookup(path),
            max_size,
        }
    }

    fn artifact_args(&self, name: &str) -> FlowArgs {
        FlowArgs::ArtifactCollector {
            artifacts: vec![name.to_string()],
            use_raw_filesystem_access: self.mapper.system_root_mode(self.windows()) != PathType::Os,
            max_file_size: self.collect_cap(),
            apply_parsers: false,
        }
    }

    /// Archive directory the remote side used for this flow's files
    fn archive_mode(&self, flow: &Flow) -> PathType {
        match &flow.args {
            Some(FlowArgs::FileFinder { pathtype, .. }) => *pathtype,
            Some(FlowArgs::ArtifactCollector {
                use_raw_filesystem_access: true,
                ..
            }) => self.mapper.system_root_mode(self.windows()),
            Some(FlowArgs::GetFile { pathspec }) => pathspec.pathtype,
            _ => PathType::Os,
        }
    }

    async fn create_flow(&self, args: FlowArgs) -> Result<Flow> {
        debug!("Launching a {name} flow", name: args.flow_name().to_string());
        let flow = self.session.create_flow(self.client_id(), args).await?;
        info!("Started flow {flow_id} ({name})", flow_id: flow.flow_id.clone(), name: flow.name.clone());
        Ok(flow)
    }

    /// Hand a flow's wait-and-unpack to the pool and track it
    async fn launch(&self, flow: Flow, local_dir: PathBuf) {
        let mode = self.archive_mode(&flow);
        let task = {
            let session = self.session.clone();
            let client_id = self.client_id().to_string();
            let flow = flow.clone();
            async move {
                _ = wait_and_unpack(session, client_id, flow, mode, local_dir).await?;
                Ok::<(), FlowctlError>(())
            }
        };
        debug!("Backgrounding flow {flow_id}", flow_id: flow.flow_id.clone());
        let handle = self.pool.submit(&flow.flow_id, task);
        self.flow_monitor.track(flow.clone()).await;
        _ = self.launched.lock().await.insert(
            flow.flow_id.clone(),
            LaunchedFlow {
                flow,
                handle,
                error_reported: false,
            },
        );
    }

    /// Id of the newest reusable root timeline, if any is fresh enough
    pub async fn last_timeline(&self) -> Result<Option<String>> {
        let threshold = (Utc::now() - self.config.stale_timeline()).timestamp_micros();
        let mut latest_timestamp = threshold;
        let mut latest = None;

        for flow in self.session.list_flows(self.client_id()).await? {
            if flow.state != FlowState::Terminated || flow.name != TIMELINE_FLOW {
                continue;
            }
            let flow = match flow.args {
                Some(_) => flow,
                None => self.session.get_flow(self.client_id(), &flow.flow_id).await?,
            };
            let Some(FlowArgs::Timeline { root }) = &flow.args else {
                continue;
            };
            if !is_root_timeline(root) {
                continue;
            }
            for result in self.session.list_results(self.client_id(), &flow.flow_id).await? {
                if result.timestamp > latest_timestamp {
                    latest_timestamp = result.timestamp;
                    latest = Some(flow.flow_id.clone());
                }
            }
        }
        Ok(latest)
    }

    /// Collect a timeline body rooted at `path`, or reuse `existing`.
    ///
    /// Returns the body and the freshness stamp of the flow's first result.
    pub async fn collect_timeline(
        &self,
        path: Option<&str>,
        existing: Option<&str>,
    ) -> Result<(Bytes, i64)> {
        let flow = match existing {
            Some(flow_id) => {
                info!("Using existing timeline flow {flow_id}", flow_id: flow_id.to_string());
                self.session.get_flow(self.client_id(), flow_id).await?
            }
            None => {
                let root = match path {
                    Some(p) if self.windows() && p.len() > 1 => self.remote_path(p),
                    Some(p) => p,
                    None => "/",
                };
                self.create_flow(FlowArgs::Timeline {
                    root: root.to_string(),
                })
                .await?
            }
        };

        let done = self
            .session
            .wait_until_done(self.client_id(), &flow.flow_id)
            .await?;
        debug!("Timeline flow complete, collecting and decoding");

        let results = self.session.list_results(self.client_id(), &done.flow_id).await?;
        let freshness = results.first().map_or(0, |r| r.timestamp);
        if let Some(first) = results.first() {
            if let (
                ResultPayload::Timeline {
                    filesystem_type: Some(fs_type),
                },
                Some(FlowArgs::Timeline { root }),
            ) = (&first.payload, &done.args)
            {
                self.mapper.record(root, fs_type);
            }
        }

        let body = self.session.timeline_body(self.client_id(), &done.flow_id).await?;
        Ok((body, freshness))
    }

    /// Collect a timeline for `path` and merge it into `fs`.
    ///
    /// The subtree at `path` is invalidated first so no stale children
    /// survive. Returns the number of rows parsed.
    pub async fn populate_timeline(
        &self,
        fs: &mut EmulatedFs,
        path: &str,
        existing: Option<&str>,
    ) -> Result<usize> {
        let local = if path == "." {
            fs.pwd().to_string()
        } else if self.windows() && !path.starts_with('/') && path.get(1..2) == Some(":") {
            fs.normalise_path(&format!("/{path}"))
        } else {
            fs.normalise_path(path)
        };

        let mut remote = local.clone();
        if is_drive_root(&local) {
            remote.push('/');
        }

        let (body, freshness) = self.collect_timeline(Some(&remote), existing).await?;
        fs.invalidate(&local, freshness);
        Ok(fs.parse_timeline(&body, freshness)?)
    }

    /// Hash and stat remote files, plus the Zone.Identifier stream of a
    /// single Windows file when `collect_ads` is set.
    ///
    /// Flow failures are reported as lines rather than errors.
    pub async fn file_info(&self, path: &str, collect_ads: bool) -> Result<String> {
        let path = self.remote_path(path);
        let collect_ads = collect_ads && self.windows() && !path.contains('*');
        let mut lines = Vec::new();

        let hash_flow = self
            .create_flow(self.file_finder_args(path, FileFinderAction::Hash))
            .await?;

        let mut ads_lines = Vec::new();
        if collect_ads {
            let args = FlowArgs::GetFile {
                pathspec: PathSpec::new(path, PathType::Ntfs).with_stream(ADS_STREAM),
            };
            let ads_flow = self.create_flow(args).await?;
            match self.wait_and_format(&ads_flow).await {
                Ok(formatted) => ads_lines = formatted,
                Err(FlowctlError::FlowFailed { message, .. }) => {
                    let line = format!("ADS Flow collection {} failed: {message}", ads_flow.flow_id);
                    warn!("{line}", line: line.clone());
                    lines.push(line);
                }
                Err(e) => return Err(e),
            }
        }

        match self.wait_and_format(&hash_flow).await {
            Ok(formatted) => lines.extend(formatted),
            Err(FlowctlError::FlowFailed { message, .. }) => {
                let line = format!("HASH Flow collection {} failed: {message}", hash_flow.flow_id);
                warn!("{line}", line: line.clone());
                lines.push(line);
                return Ok(lines.join("\n"));
            }
            Err(e) => return Err(e),
        }

        lines.extend(ads_lines);
        Ok(lines.join("\n"))
    }

    async fn wait_and_format(&self, flow: &Flow) -> Result<Vec<String>> {
        let done = self
            .session
            .wait_until_done(self.client_id(), &flow.flow_id)
            .await?;
        format_flow_results(self.session.as_ref(), &done).await
    }

    /// Rendered results, or a single line when the flow failed remotely
    async fn wait_and_report(&self, flow: &Flow) -> Result<Vec<String>> {
        match self.wait_and_format(flow).await {
            Err(FlowctlError::FlowFailed { flow_id, message }) => {
                Ok(vec![flow_failure_line(&flow_id, &message)])
            }
            other => other,
        }
    }

    /// Wait for a flow in the caller and unpack its files
    async fn complete_in_caller(&self, flow: Flow, local_dir: &Path) -> Result<Collected> {
        let mode = self.archive_mode(&flow);
        let result = wait_and_unpack(
            self.session.clone(),
            self.client_id().to_string(),
            flow,
            mode,
            local_dir.to_path_buf(),
        )
        .await;
        match result {
            Ok(files) => Ok(Collected {
                files,
                failure: None,
            }),
            Err(FlowctlError::FlowFailed { flow_id, message }) => {
                Ok(Collected::failed(&flow_id, &message))
            }
            Err(e) => Err(e),
        }
    }

    /// Download files matching `remote_path` into `local_dir`, waiting here.
    ///
    /// A remote flow failure is reported on the result, not as an error.
    pub async fn collect_files(&self, remote_path: &str, local_dir: &Path) -> Result<Collected> {
        _ = prepare_output_dir(local_dir)?;
        info!("Collecting files: {path}", path: remote_path.to_string());
        let flow = self
            .create_flow(self.file_finder_args(remote_path, FileFinderAction::Download))
            .await?;
        self.complete_in_caller(flow, local_dir).await
    }

    /// Start downloading `remote_path` and return the flow id immediately
    pub async fn collect_files_in_background(
        &self,
        remote_path: &str,
        local_dir: &Path,
    ) -> Result<String> {
        info!("Collecting files: {path}", path: remote_path.to_string());
        let flow = self
            .create_flow(self.file_finder_args(remote_path, FileFinderAction::Download))
            .await?;
        let flow_id = flow.flow_id.clone();
        self.launch(flow, local_dir.to_path_buf()).await;
        Ok(flow_id)
    }

    /// Collect an artifact and wait for its files in the caller
    pub async fn download_artifact(&self, name: &str, local_dir: &Path) -> Result<Collected> {
        _ = prepare_output_dir(local_dir)?;
        info!("Collecting artefact: {name}", name: name.to_string());
        let flow = self.create_flow(self.artifact_args(name)).await?;
        self.complete_in_caller(flow, local_dir).await
    }

    /// Collect an artifact, choosing where to wait from its sources.
    ///
    /// File-producing artifacts run in the background and return no lines;
    /// the rest are waited on and their results rendered.
    pub async fn collect_artifact(&self, name: &str, local_dir: &Path) -> Result<Vec<String>> {
        let os = self.client.os;
        let execution = self
            .with_catalog(|catalog| match catalog.get(name) {
                Some(artifact) => classify_artifact(artifact, os),
                None => Err(FlowctlError::runtime("Invalid artefact name requested")),
            })
            .await??;

        info!("Collecting artefact: {name}", name: name.to_string());
        let flow = self.create_flow(self.artifact_args(name)).await?;

        match execution {
            Execution::Background => {
                self.launch(flow, local_dir.to_path_buf()).await;
                Ok(Vec::new())
            }
            Execution::Synchronous => {
                debug!("Synchronously waiting for flow {flow_id}", flow_id: flow.flow_id.clone());
                self.wait_and_report(&flow).await
            }
        }
    }

    async fn classify(&self, flow: &Flow) -> Result<Execution> {
        let Some(args) = &flow.args else {
            return Err(FlowctlError::runtime(format!(
                "Cannot classify {} flows",
                flow.name
            )));
        };
        let os = self.client.os;
        self.with_catalog(|catalog| classify_flow(args, os, |name| catalog.get(name)))
            .await?
    }

    async fn fetch_resumable(&self, flow_id: &str) -> Result<Flow> {
        let flow = self.session.get_flow(self.client_id(), flow_id).await?;
        if !RESUMABLE_FLOWS.contains(&flow.name.as_str()) {
            return Err(FlowctlError::NotResumableFlowType {
                flow_id: flow.flow_id,
                name: flow.name,
            });
        }
        Ok(flow)
    }

    /// Attach a flow launched elsewhere to this session
    pub async fn reattach_flow(&self, flow_id: &str, local_dir: Option<&Path>) -> Result<Vec<String>> {
        let flow = self.fetch_resumable(flow_id).await?;

        if self.launched.lock().await.contains_key(&flow.flow_id) {
            return Ok(vec![format!(
                "{} already tracked by this session",
                flow.flow_id
            )]);
        }

        match self.classify(&flow).await? {
            Execution::Synchronous => self.wait_and_report(&flow).await,
            Execution::Background => {
                let local_dir = local_dir.map_or_else(|| PathBuf::from("."), Path::to_path_buf);
                let flow_id = flow.flow_id.clone();
                self.launch(flow, local_dir).await;
                Ok(vec![format!("Queued {flow_id} for completion.")])
            }
        }
    }

    /// Wait for a flow launched elsewhere and render or unpack its results
    pub async fn complete_flow(&self, flow_id: &str, local_dir: &Path) -> Result<Vec<String>> {
        let flow = self.fetch_resumable(flow_id).await?;
        match self.classify(&flow).await? {
            Execution::Synchronous => self.wait_and_report(&flow).await,
            Execution::Background => Ok(self.complete_in_caller(flow, local_dir).await?.lines()),
        }
    }

    pub async fn flow_counts(&self) -> FlowCounts {
        let launched = self.launched.lock().await;
        FlowCounts {
            running: launched.values().filter(|l| l.handle.is_running()).count(),
            total: launched.len(),
        }
    }

    /// One line per background flow with its derived state.
    ///
    /// A failure is appended the first time it is seen after the task ends.
    /// Flows last seen RUNNING are refreshed without holding the launched
    /// table, so counts and new launches never wait on the round trips.
    pub async fn background_flows_state(&self) -> String {
        // Sampled before the refresh so DOWNLOADING never follows COMPLETE
        let (sampled, stale): (BTreeMap<String, bool>, Vec<String>) = {
            let launched = self.launched.lock().await;
            if launched.is_empty() {
                return "No launched flows".to_string();
            }
            let sampled = launched
                .iter()
                .map(|(id, entry)| (id.clone(), entry.handle.is_running()))
                .collect();
            let stale = launched
                .values()
                .filter(|entry| entry.flow.state == FlowState::Running)
                .map(|entry| entry.flow.flow_id.clone())
                .collect();
            (sampled, stale)
        };

        let mut refreshed = Vec::with_capacity(stale.len());
        for flow_id in stale {
            debug!("Refreshing state for flow: {flow_id}", flow_id: flow_id.clone());
            match self.session.get_flow(self.client_id(), &flow_id).await {
                Ok(flow) => {
                    self.flow_monitor.update(flow.clone()).await;
                    refreshed.push(flow);
                }
                Err(e) => {
                    warn!("Refresh of flow {flow_id} failed: {error}", flow_id: flow_id.clone(), error: e.to_string());
                }
            }
        }

        let mut launched = self.launched.lock().await;
        for flow in refreshed {
            if let Some(entry) = launched.get_mut(&flow.flow_id) {
                entry.flow = flow;
            }
        }

        let mut lines = Vec::with_capacity(launched.len());
        for (flow_id, entry) in launched.iter_mut() {
            let running = sampled
                .get(flow_id)
                .copied()
                .unwrap_or_else(|| entry.handle.is_running());

            let state = match (entry.flow.state, running) {
                (FlowState::Terminated, true) => "DOWNLOADING",
                (FlowState::Terminated, false) => "COMPLETE",
                (other, _) => other.as_str(),
            };

            let mut error = String::new();
            if !running && !entry.error_reported {
                if let Some(message) = entry.handle.error() {
                    error = format!(" \"{message}\"");
                    entry.error_reported = true;
                }
            }

            let param = flow_args_lines(entry.flow.args.as_ref(), false)
                .into_iter()
                .next()
                .unwrap_or_default();
            lines.push(format!(
                "\t{} {} {param} {state}{error}",
                entry.flow.flow_id, entry.flow.name
            ));
        }
        lines.join("\n")
    }

    /// The `count` most recent flows on the endpoint, launched by anyone
    pub async fn list_all_flows(&self, count: usize) -> String {
        self.flow_monitor
            .list_recent(count)
            .await
            .iter()
            .map(|flow| {
                let param = flow_args_lines(flow.args.as_ref(), false)
                    .into_iter()
                    .next()
                    .unwrap_or_default();
                format!(
                    "\t{} {} {} {param} {}",
                    flow.flow_id,
                    micros_readable(flow.started_at),
                    flow.name,
                    flow.state
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Detailed rendering of one flow
    pub async fn flow_detail(&self, flow_id: &str) -> Result<String> {
        let flow = self.flow_monitor.get_flow(flow_id).await?;

        let mut lines = vec![
            flow.name.clone(),
            format!("\tCreator     {}", flow.creator),
            format!("\tState       {}", flow.state),
            format!("\tStarted     {}", micros_readable(flow.started_at)),
            format!("\tLast Active {}", micros_readable(flow.last_active_at)),
            "\tArgs:".to_string(),
        ];
        lines.extend(
            flow_args_lines(flow.args.as_ref(), true)
                .into_iter()
                .map(|l| format!("\t            {l}")),
        );

        if flow.state == FlowState::Error {
            lines.push("\tError Details".to_string());
            lines.push(error_details(&flow));
        }
        Ok(lines.join("\n"))
    }

    /// Wait until every background flow has recorded its outcome
    pub async fn drain_background(&self) {
        self.pool.drain().await;
    }

    /// Stop the monitors, drain the pool and report unreported failures
    pub async fn shutdown(&self) -> Vec<String> {
        self.cancel.cancel();

        let pending: Vec<String> = self
            .launched
            .lock()
            .await
            .values()
            .filter(|l| l.handle.is_running())
            .map(|l| l.flow.flow_id.clone())
            .collect();
        if !pending.is_empty() {
            info!("Waiting on flows to finish: {pending}", pending: pending.join(", "));
        }
        self.drain_background().await;

        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                debug!("Background monitor ended abnormally: {error}", error: e.to_string());
            }
        }

        let mut failures = Vec::new();
        for entry in self.launched.lock().await.values_mut() {
            if let Some(message) = entry.handle.error() {
                debug!("Flow {flow_id} encountered error: {message}", flow_id: entry.flow.flow_id.clone(), message: message.clone());
                if !entry.error_reported {
                    failures.push(format!("{} - {message}", entry.flow.flow_id));
                    entry.error_reported = true;
                }
            }
        }
        failures
    }
}

fn micros_readable(micros: i64) -> String {
    readable_timestamp(micros as f64 / 1_000_000.0)
}

/// Error text of a failed flow, most specific source first
fn error_details(flow: &Flow) -> String {
    if let Some(status) = flow.status.as_deref().filter(|s| !s.is_empty()) {
        if status.contains("error_message") {
            if let Some(message) = status
                .lines()
                .map(str::trim)
                .find_map(|l| l.strip_prefix("error_message : "))
            {
                return format!("\t\t{message}");
            }
        }
        return format!("\t\t{status}");
    }
    match flow.error_description.as_deref() {
        Some(description) if !description.is_empty() => description
            .lines()
            .map(|l| format!("\t\t{l}"))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => "\t\tMissing error message".to_string(),
    }
}
