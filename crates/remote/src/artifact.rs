// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::client::OsFamily;

/// Kind of a single artifact source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Command,
    Grep,
    ClientAction,
    RegistryKey,
    RegistryValue,
    Wmi,
    File,
    Path,
    ArtifactFiles,
    ArtifactGroup,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSource {
    pub kind: SourceKind,
    #[serde(default)]
    pub supported_os: Vec<OsFamily>,
}

/// A named, multi-source collection recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub supported_os: Vec<OsFamily>,
    pub sources: Vec<ArtifactSource>,
}

impl Artifact {
    #[must_use]
    pub fn supports(&self, os: OsFamily) -> bool {
        self.supported_os.contains(&os)
    }
}
