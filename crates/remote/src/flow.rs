// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Flows: remote operations with a lifecycle and typed arguments.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote lifecycle of a flow; RUNNING moves to exactly one terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Running,
    Terminated,
    Error,
}

impl FlowState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowState::Running => "RUNNING",
            FlowState::Terminated => "TERMINATED",
            FlowState::Error => "ERROR",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FlowState::Running)
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFinderAction {
    Stat,
    Hash,
    Download,
}

impl FileFinderAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFinderAction::Stat => "STAT",
            FileFinderAction::Hash => "HASH",
            FileFinderAction::Download => "DOWNLOAD",
        }
    }
}

/// Low-level path addressing mode on the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PathType {
    /// Generic OS file APIs
    #[default]
    Os,
    /// Raw access through the sleuthkit
    Tsk,
    /// Raw NTFS access
    Ntfs,
    Registry,
}

impl PathType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PathType::Os => "OS",
            PathType::Tsk => "TSK",
            PathType::Ntfs => "NTFS",
            PathType::Registry => "REGISTRY",
        }
    }

    /// Directory name used for this mode inside result archives
    #[must_use]
    pub fn dir_name(&self) -> &'static str {
        match self {
            PathType::Os => "os",
            PathType::Tsk => "tsk",
            PathType::Ntfs => "ntfs",
            PathType::Registry => "registry",
        }
    }
}

/// A path on the endpoint, qualified by how to reach it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathSpec {
    pub path: String,
    pub pathtype: PathType,
    #[serde(default)]
    pub stream_name: Option<String>,
    #[serde(default)]
    pub mount_point: Option<String>,
    #[serde(default)]
    pub nested_path: Option<Box<PathSpec>>,
}

impl PathSpec {
    #[must_use]
    pub fn new<S: Into<String>>(path: S, pathtype: PathType) -> Self {
        Self {
            path: path.into(),
            pathtype,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_stream<S: Into<String>>(mut self, stream: S) -> Self {
        self.stream_name = Some(stream.into());
        self
    }
}

/// Arguments of a flow, one variant per supported flow kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FlowArgs {
    Timeline {
        root: String,
    },
    FileFinder {
        paths: Vec<String>,
        action: FileFinderAction,
        pathtype: PathType,
        max_size: Option<u64>,
    },
    ArtifactCollector {
        artifacts: Vec<String>,
        use_raw_filesystem_access: bool,
        max_file_size: Option<u64>,
        apply_parsers: bool,
    },
    GetFile {
        pathspec: PathSpec,
    },
    MultiGetFile {
        pathspecs: Vec<PathSpec>,
    },
    CollectFilesByKnownPath {
        paths: Vec<String>,
        collection_level: String,
    },
    CollectBrowserHistory {
        browsers: Vec<String>,
    },
    ListDirectory {
        pathspec: PathSpec,
    },
    Interrogate,
    /// An argument payload this crate cannot interpret
    Unsupported {
        type_name: String,
    },
}

impl FlowArgs {
    /// Remote flow name that runs with these arguments
    #[must_use]
    pub fn flow_name(&self) -> &str {
        match self {
            FlowArgs::Timeline { .. } => "TimelineFlow",
            FlowArgs::FileFinder { .. } => "ClientFileFinder",
            FlowArgs::ArtifactCollector { .. } => "ArtifactCollectorFlow",
            FlowArgs::GetFile { .. } => "GetFile",
            FlowArgs::MultiGetFile { .. } => "MultiGetFile",
            FlowArgs::CollectFilesByKnownPath { .. } => "CollectFilesByKnownPath",
            FlowArgs::CollectBrowserHistory { .. } => "CollectBrowserHistory",
            FlowArgs::ListDirectory { .. } => "ListDirectory",
            FlowArgs::Interrogate => "Interrogate",
            FlowArgs::Unsupported { type_name } => type_name,
        }
    }
}

/// Snapshot of a flow as last fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub flow_id: String,
    pub client_id: String,
    pub name: String,
    /// `None` until the argument payload has been fetched and decoded
    pub args: Option<FlowArgs>,
    pub state: FlowState,
    pub creator: String,
    /// Microseconds since the epoch
    pub started_at: i64,
    /// Microseconds since the epoch
    pub last_active_at: i64,
    #[serde(default)]
    pub error_description: Option<String>,
    /// Raw status text reported by the server for failed flows
    #[serde(default)]
    pub status: Option<String>,
}

impl Flow {
    /// True when the cached copy may be out of date
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        self.args.is_none() || self.state == FlowState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_names() {
        let args = FlowArgs::FileFinder {
            paths: vec!["/etc/passwd".to_string()],
            action: FileFinderAction::Download,
            pathtype: PathType::Os,
            max_size: None,
        };
        assert_eq!(args.flow_name(), "ClientFileFinder");
        assert_eq!(
            FlowArgs::Unsupported {
                type_name: "YaraProcessScan".to_string()
            }
            .flow_name(),
            "YaraProcessScan"
        );
    }

    #[test]
    fn test_args_serde_is_tagged() {
        let args = FlowArgs::Timeline {
            root: "/".to_string(),
        };
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(json["kind"], "Timeline");
        let back: FlowArgs = serde_json::from_value(json).unwrap();
        assert_eq!(back, args);
    }

    #[test]
    fn test_pathtype_dirs() {
        assert_eq!(PathType::Os.dir_name(), "os");
        assert_eq!(PathType::Ntfs.dir_name(), "ntfs");
        assert_eq!(PathType::Ntfs.as_str(), "NTFS");
    }
}
