// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::flow::PathSpec;

/// One result row produced by a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    /// Microseconds since the epoch
    pub timestamp: i64,
    pub payload: ResultPayload,
}

/// Result payloads, one variant per payload kind this crate decodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ResultPayload {
    /// Completion marker of a timeline flow
    Timeline {
        #[serde(default)]
        filesystem_type: Option<String>,
    },
    FileFinder {
        stat: StatEntry,
        #[serde(default)]
        hashes: Option<HashEntry>,
    },
    Stat(StatEntry),
    Unsupported {
        type_name: String,
    },
}

impl ResultPayload {
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            ResultPayload::Timeline { .. } => "TimelineResult",
            ResultPayload::FileFinder { .. } => "FileFinderResult",
            ResultPayload::Stat(_) => "StatEntry",
            ResultPayload::Unsupported { type_name } => type_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatEntry {
    pub pathspec: PathSpec,
    pub st_mode: u32,
    pub st_ino: u64,
    pub st_dev: u64,
    pub st_nlink: u64,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_size: u64,
    pub st_atime: i64,
    pub st_mtime: i64,
    pub st_ctime: i64,
    pub st_blocks: u64,
    pub st_blksize: u64,
    pub st_rdev: u64,
    pub st_flags_osx: u32,
    pub st_flags_linux: u32,
    #[serde(default)]
    pub registry: Option<RegistryValue>,
}

/// A registry value attached to a registry stat entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryValue {
    /// Registry type name, e.g. `REG_SZ`
    pub registry_type: String,
    /// Populated fields of the value, in declaration order
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HashEntry {
    pub md5: Vec<u8>,
    pub sha1: Vec<u8>,
    pub sha256: Vec<u8>,
}
