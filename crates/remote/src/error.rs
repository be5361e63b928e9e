// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for remote session operations

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The investigator holds no approval for this endpoint
    #[error("Access to {0} is forbidden")]
    AccessForbidden(String),

    /// A flow reached the ERROR state
    #[error("Flow {flow_id} failed: {message}")]
    FlowFailed { flow_id: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;
