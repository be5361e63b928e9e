// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Unpacking of collected-file archives into a local tree.
//!
//! Archives hold `{client}_flow_{name}_{flow}/{client}/fs/{mode}/<remote path>`
//! per collected file, plus a manifest and a client-info file. Only the remote
//! path survives under the local directory.

use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};

use diagnostics::*;
use futures::StreamExt;
use remote::{Flow, PathType, RemoteSession};
use tokio::io::AsyncWriteExt;

use crate::{FlowctlError, Result};

/// Names inside one flow's archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    pub client_id: String,
    pub flow_name: String,
    pub flow_id: String,
    pub mode: PathType,
}

impl ArchiveLayout {
    #[must_use]
    pub fn new(client_id: &str, flow: &Flow, mode: PathType) -> Self {
        Self {
            client_id: client_id.to_string(),
            flow_name: flow.name.clone(),
            flow_id: flow.flow_id.clone(),
            mode,
        }
    }

    /// Top-level directory of the archive
    #[must_use]
    pub fn zip_root(&self) -> String {
        format!("{}_flow_{}_{}", self.client_id, self.flow_name, self.flow_id)
    }

    /// Prefix stripped from every collected file
    #[must_use]
    pub fn prefix(&self) -> String {
        format!(
            "{}/{}/fs/{}/",
            self.zip_root(),
            self.client_id,
            self.mode.dir_name()
        )
    }

    fn is_marker(&self, name: &str) -> bool {
        name.ends_with(&format!("{}/MANIFEST", self.flow_id))
            || name.ends_with(&format!("{}/client_info.yaml", self.client_id))
    }
}

/// Relative path of a collected file, or `None` when it must be skipped
fn local_relative(layout: &ArchiveLayout, name: &str) -> Option<PathBuf> {
    let relative = name.strip_prefix(&layout.prefix())?;
    let relative = Path::new(relative);
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| relative.to_path_buf())
}

/// Extract every collected file of `layout` from `reader` into `local_dir`.
///
/// Each file is written to a temporary sibling and then renamed into place.
/// Returns the written paths in archive order.
pub fn extract_archive<R: Read + Seek>(
    reader: R,
    layout: &ArchiveLayout,
    local_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut written = Vec::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        if entry.is_dir() {
            continue;
        }
        if layout.is_marker(&name) {
            debug!("Skipping extraction of {name} based on filename match", name: name);
            continue;
        }
        let Some(relative) = local_relative(layout, &name) else {
            debug!("Skipping {name}: outside {prefix}", name: name, prefix: layout.prefix());
            continue;
        };

        let dest = local_dir.join(relative);
        let parent = dest.parent().unwrap_or(local_dir);
        std::fs::create_dir_all(parent)?;

        let mut scratch = tempfile::NamedTempFile::new_in(parent)?;
        _ = std::io::copy(&mut entry, &mut scratch)?;
        _ = scratch.persist(&dest).map_err(|e| e.error)?;

        debug!("Extracted {name} to {dest}", name: name, dest: dest.display().to_string());
        written.push(dest);
    }

    // Nothing is ever extracted under the archive root, but an older run may
    // have left one behind
    let residue = local_dir.join(layout.zip_root());
    if residue.is_dir() {
        std::fs::remove_dir_all(residue)?;
    }

    Ok(written)
}

/// Where results for `local` end up.
///
/// Collections into the working directory go to a per-endpoint subdirectory
/// unless the working directory already is one.
#[must_use]
pub fn resolve_local_dir(local: &Path, cwd: &Path, client_id: &str) -> PathBuf {
    let absolute = if local.is_absolute() {
        local.to_path_buf()
    } else {
        cwd.join(local)
    };
    if absolute == cwd && !cwd.ends_with(client_id) {
        absolute.join(client_id)
    } else {
        absolute
    }
}

/// Create `path` if missing; an existing non-directory is an error
pub fn prepare_output_dir(path: &Path) -> Result<PathBuf> {
    debug!("Creating output directory: {path}", path: path.display().to_string());
    if path.exists() {
        if !path.is_dir() {
            return Err(FlowctlError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a directory", path.display()),
            )));
        }
    } else {
        std::fs::create_dir_all(path)?;
    }
    Ok(std::path::absolute(path)?)
}

/// Download a finished flow's archive and extract it into `local_dir`
pub async fn unpack_flow_results(
    session: &dyn RemoteSession,
    client_id: &str,
    flow: &Flow,
    mode: PathType,
    local_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let results = session.list_results(client_id, &flow.flow_id).await?;
    if results.is_empty() {
        return Err(FlowctlError::InvalidRemotePath(format!(
            "No FileFinder results for {}",
            flow.flow_id
        )));
    }

    let scratch = tempfile::tempfile()?;
    let mut file = tokio::fs::File::from_std(scratch);
    let mut stream = session.files_archive(client_id, &flow.flow_id).await?;
    let mut size = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size += chunk.len();
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    debug!("Wrote {size} archive bytes for {flow_id}", size: size, flow_id: flow.flow_id.clone());

    let reader = file.into_std().await;
    let layout = ArchiveLayout::new(client_id, flow, mode);
    let local_dir = local_dir.to_path_buf();
    let written =
        tokio::task::spawn_blocking(move || extract_archive(reader, &layout, &local_dir)).await??;

    info!("Flow {flow_id} unpacked {count} files", flow_id: flow.flow_id.clone(), count: written.len());
    Ok(written)
}
