// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Synchronous-versus-background classification of flows.
//!
//! Everything here is a pure function of the flow kind, its declared action
//! or artifact sources, and the endpoint OS.

use remote::{Artifact, FileFinderAction, FlowArgs, OsFamily, SourceKind};

use crate::{FlowctlError, Result};

/// Flow kinds that can be reattached or completed from another session
pub const RESUMABLE_FLOWS: [&str; 3] = ["ClientFileFinder", "ArtifactCollectorFlow", "GetFile"];

/// Where a flow is waited on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Waited on by the caller; results are formatted and returned
    Synchronous,
    /// Submitted to the worker pool; results are unpacked to disk
    Background,
}

/// Bucket of a single artifact source kind, `None` for unsupported kinds
#[must_use]
pub fn source_execution(kind: &SourceKind) -> Option<Execution> {
    match kind {
        SourceKind::Command
        | SourceKind::Grep
        | SourceKind::ClientAction
        | SourceKind::RegistryKey
        | SourceKind::RegistryValue
        | SourceKind::Wmi => Some(Execution::Synchronous),
        SourceKind::File | SourceKind::Path | SourceKind::ArtifactFiles | SourceKind::ArtifactGroup => {
            Some(Execution::Background)
        }
        SourceKind::Other(_) => None,
    }
}

/// Pick the source kind that decides how an artifact is collected.
///
/// Uniform sources (a single source, all the same kind, or all in the same
/// bucket) use the first one. Mixed sources fall back to the first source
/// declaring the endpoint OS.
pub fn determine_source(artifact: &Artifact, os: OsFamily) -> Result<SourceKind> {
    let sources = &artifact.sources;
    let Some(first) = sources.first() else {
        return Err(FlowctlError::runtime(format!(
            "Unsupported artefact \"{}\"",
            artifact.name
        )));
    };

    let bucket = |execution: Execution| {
        sources
            .iter()
            .all(|s| source_execution(&s.kind) == Some(execution))
    };
    if sources.len() == 1
        || sources.iter().all(|s| s.kind == first.kind)
        || bucket(Execution::Synchronous)
        || bucket(Execution::Background)
    {
        return Ok(first.kind.clone());
    }

    sources
        .iter()
        .find(|s| s.supported_os.contains(&os))
        .map(|s| s.kind.clone())
        .ok_or_else(|| {
            FlowctlError::runtime(format!("Unsupported artefact \"{}\"", artifact.name))
        })
}

pub fn classify_artifact(artifact: &Artifact, os: OsFamily) -> Result<Execution> {
    let kind = determine_source(artifact, os)?;
    source_execution(&kind).ok_or_else(|| {
        FlowctlError::runtime(
            "Unsupported artefact type! Consider raising a bug: https://github.com/google/grrshell/issues/new",
        )
    })
}

/// Classify an existing flow from its arguments.
///
/// `catalog` resolves artifact names for artifact collections.
pub fn classify_flow<'a, F>(args: &FlowArgs, os: OsFamily, catalog: F) -> Result<Execution>
where
    F: Fn(&str) -> Option<&'a Artifact>,
{
    match args {
        FlowArgs::GetFile { .. } => Ok(Execution::Synchronous),
        FlowArgs::CollectFilesByKnownPath { .. } | FlowArgs::CollectBrowserHistory { .. } => {
            Ok(Execution::Background)
        }
        FlowArgs::FileFinder { action, .. } => Ok(match action {
            FileFinderAction::Download => Execution::Background,
            FileFinderAction::Stat | FileFinderAction::Hash => Execution::Synchronous,
        }),
        FlowArgs::ArtifactCollector { artifacts, .. } => {
            let name = artifacts.first().ok_or_else(|| {
                FlowctlError::runtime("No artefacts specified in ArtifactCollectorFlow")
            })?;
            let artifact = catalog(name)
                .ok_or_else(|| FlowctlError::runtime("Invalid artefact name requested"))?;
            let kind = determine_source(artifact, os)?;
            source_execution(&kind)
                .ok_or_else(|| FlowctlError::runtime("Unsupported Artefact type for resumption."))
        }
        other => Err(FlowctlError::runtime(format!(
            "Cannot classify {} flows",
            other.flow_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote::{ArtifactSource, PathType};

    fn source(kind: SourceKind, os: &[OsFamily]) -> ArtifactSource {
        ArtifactSource {
            kind,
            supported_os: os.to_vec(),
        }
    }

    fn artifact(name: &str, sources: Vec<ArtifactSource>) -> Artifact {
        Artifact {
            name: name.to_string(),
            supported_os: vec![OsFamily::Linux, OsFamily::Windows],
            sources,
        }
    }

    #[test]
    fn test_single_and_uniform_sources() {
        let a = artifact("BashHistory", vec![source(SourceKind::File, &[])]);
        assert_eq!(classify_artifact(&a, OsFamily::Linux).unwrap(), Execution::Background);

        let a = artifact(
            "Mixed sync",
            vec![
                source(SourceKind::Command, &[]),
                source(SourceKind::RegistryKey, &[]),
                source(SourceKind::Wmi, &[]),
            ],
        );
        assert_eq!(determine_source(&a, OsFamily::Windows).unwrap(), SourceKind::Command);
        assert_eq!(classify_artifact(&a, OsFamily::Windows).unwrap(), Execution::Synchronous);
    }

    #[test]
    fn test_mixed_sources_use_os_match() {
        let a = artifact(
            "Mixed",
            vec![
                source(SourceKind::Command, &[OsFamily::Linux]),
                source(SourceKind::File, &[OsFamily::Windows]),
            ],
        );
        assert_eq!(classify_artifact(&a, OsFamily::Linux).unwrap(), Execution::Synchronous);
        assert_eq!(classify_artifact(&a, OsFamily::Windows).unwrap(), Execution::Background);
        assert!(matches!(
            classify_artifact(&a, OsFamily::Darwin),
            Err(FlowctlError::Runtime(_))
        ));
    }

    #[test]
    fn test_unsupported_kind() {
        let a = artifact("Odd", vec![source(SourceKind::Other("REKALL_PLUGIN".into()), &[])]);
        let err = classify_artifact(&a, OsFamily::Linux).unwrap_err();
        assert!(err.to_string().starts_with("Unsupported artefact type!"));
    }

    #[test]
    fn test_classification_is_repeatable() {
        let a = artifact(
            "Mixed",
            vec![
                source(SourceKind::Grep, &[OsFamily::Darwin]),
                source(SourceKind::Path, &[OsFamily::Linux]),
            ],
        );
        let first = classify_artifact(&a, OsFamily::Linux).unwrap();
        for _ in 0..10 {
            assert_eq!(classify_artifact(&a, OsFamily::Linux).unwrap(), first);
        }
    }

    #[test]
    fn test_classify_flow_kinds() {
        let none = |_: &str| None;
        let download = FlowArgs::FileFinder {
            paths: vec!["/x".into()],
            action: FileFinderAction::Download,
            pathtype: PathType::Os,
            max_size: None,
        };
        let hash = FlowArgs::FileFinder {
            paths: vec!["/x".into()],
            action: FileFinderAction::Hash,
            pathtype: PathType::Os,
            max_size: None,
        };
        let get = FlowArgs::GetFile {
            pathspec: remote::PathSpec::new("/x", PathType::Ntfs),
        };
        assert_eq!(classify_flow(&download, OsFamily::Linux, none).unwrap(), Execution::Background);
        assert_eq!(classify_flow(&hash, OsFamily::Linux, none).unwrap(), Execution::Synchronous);
        assert_eq!(classify_flow(&get, OsFamily::Windows, none).unwrap(), Execution::Synchronous);
    }

    #[test]
    fn test_classify_artifact_flow_uses_catalog() {
        let catalog = vec![artifact("BashHistory", vec![source(SourceKind::File, &[])])];
        let lookup = |name: &str| catalog.iter().find(|a| a.name == name);
        let args = |names: &[&str]| FlowArgs::ArtifactCollector {
            artifacts: names.iter().map(|n| n.to_string()).collect(),
            use_raw_filesystem_access: false,
            max_file_size: None,
            apply_parsers: false,
        };

        assert_eq!(
            classify_flow(&args(&["BashHistory"]), OsFamily::Linux, lookup).unwrap(),
            Execution::Background
        );
        assert!(matches!(
            classify_flow(&args(&[]), OsFamily::Linux, lookup),
            Err(FlowctlError::Runtime(m)) if m.contains("No artefacts")
        ));
        assert!(matches!(
            classify_flow(&args(&["Nope"]), OsFamily::Linux, lookup),
            Err(FlowctlError::Runtime(_))
        ));
    }
}
