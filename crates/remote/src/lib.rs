// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Data model and session interface for the remote forensic service.
//!
//! # Architecture
//!
//! - **RemoteSession**: async trait over every server round trip
//! - **Flow / FlowArgs**: remote operations, their lifecycle and typed arguments
//! - **FlowResult**: decoded result payloads
//! - **Artifact**: named collection recipes with per-source OS applicability
//! - **testing::FakeSession**: scripted in-memory session for tests

mod artifact;
mod client;
mod error;
mod flow;
mod results;
mod session;
pub mod testing;

pub use artifact::{Artifact, ArtifactSource, SourceKind};
pub use client::{OsFamily, RemoteClient};
pub use error::{RemoteError, Result};
pub use flow::{FileFinderAction, Flow, FlowArgs, FlowState, PathSpec, PathType};
pub use results::{FlowResult, HashEntry, RegistryValue, ResultPayload, StatEntry};
pub use session::{ArchiveStream, RemoteSession};
