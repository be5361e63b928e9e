// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Flowctl - orchestration of remote forensic flows for one endpoint
//!
//! An [`Engine`] is bound to a single endpoint. It schedules flows, waits for
//! them in the caller or in a bounded background pool, unpacks collected
//! files into a local directory, feeds timeline bodies into an
//! [`snapfs::EmulatedFs`], and answers status queries from a background
//! cache of the endpoint's flows.

use remote::RemoteError;
use thiserror::Error;

mod classify;
mod config;
mod display;
mod engine;
mod monitors;
mod pathspec;
mod pool;
mod unpack;

pub use classify::{Execution, RESUMABLE_FLOWS, classify_artifact, classify_flow, determine_source};
pub use config::EngineConfig;
pub use display::{filemode, flow_args_lines, format_flow_results};
pub use engine::{Collected, Engine, FlowCounts, request_approval};
pub use monitors::{FlowMonitor, LastSeenMonitor, Monitor, spawn_monitor};
pub use pathspec::PathSpecMapper;
pub use pool::{TaskHandle, TaskState, WorkerPool};
pub use unpack::{ArchiveLayout, extract_archive, prepare_output_dir, resolve_local_dir, unpack_flow_results};

#[derive(Debug, Error)]
pub enum FlowctlError {
    #[error("{matches} potential clients found with search {query}. Specify a client ID instead.")]
    ClientNotFound { query: String, matches: usize },

    #[error("No approval to access {0}")]
    NoApproval(String),

    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    #[error("Is a file: {0}")]
    IsAFile(String),

    #[error("Flow {flow_id} is of type {name}, not supported for resumption.")]
    NotResumableFlowType { flow_id: String, name: String },

    #[error("{0}")]
    Runtime(String),

    #[error("Flow {flow_id} failed: {message}")]
    FlowFailed { flow_id: String, message: String },

    #[error("Remote error: {0}")]
    Remote(RemoteError),

    #[error("Filesystem error: {0}")]
    Fs(snapfs::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml_ng::Error),

    #[error("Background task error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl FlowctlError {
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        FlowctlError::Runtime(message.into())
    }
}

impl From<RemoteError> for FlowctlError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::FlowFailed { flow_id, message } => {
                FlowctlError::FlowFailed { flow_id, message }
            }
            RemoteError::AccessForbidden(client) => FlowctlError::NoApproval(client),
            other => FlowctlError::Remote(other),
        }
    }
}

impl From<snapfs::Error> for FlowctlError {
    fn from(err: snapfs::Error) -> Self {
        match err {
            snapfs::Error::InvalidRemotePath(path) => FlowctlError::InvalidRemotePath(path),
            snapfs::Error::IsAFile(path) => FlowctlError::IsAFile(path),
            other => FlowctlError::Fs(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, FlowctlError>;

#[cfg(test)]
mod tests;
