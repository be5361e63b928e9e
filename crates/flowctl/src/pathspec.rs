// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use diagnostics::*;
use remote::PathType;

/// Per volume root, the addressing mode the endpoint needs.
///
/// Roots are learned from timeline results; anything unmapped uses
/// [`PathType::Os`]. Entries never expire.
#[derive(Debug, Default)]
pub struct PathSpecMapper {
    roots: RwLock<BTreeMap<String, PathType>>,
}

/// Addressing mode for a reported filesystem type
#[must_use]
pub fn pathtype_for_filesystem(filesystem_type: &str) -> PathType {
    if filesystem_type.eq_ignore_ascii_case("NTFS") {
        PathType::Ntfs
    } else {
        PathType::Os
    }
}

/// `C:\` → `/C:`, `/` → `/`, `/mnt/data/` → `/mnt/data`
fn normalize_root(root: &str) -> String {
    let forward = root.replace('\\', "/");
    let trimmed = forward.trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl PathSpecMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the filesystem type a timeline reported for `root`
    pub fn record(&self, root: &str, filesystem_type: &str) {
        let key = normalize_root(root);
        let mode = pathtype_for_filesystem(filesystem_type);
        debug!("Volume {root} is {fstype}, using {mode}", root: key.clone(), fstype: filesystem_type.to_string(), mode: mode.as_str());
        _ = self
            .roots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, mode);
    }

    /// Mode for the longest recorded root containing `path`
    #[must_use]
    pub fn lookup(&self, path: &str) -> PathType {
        let path = normalize_root(path);
        let roots = self.roots.read().unwrap_or_else(PoisonError::into_inner);
        roots
            .iter()
            .filter(|(root, _)| {
                root.as_str() == "/"
                    || path == **root
                    || path
                        .strip_prefix(root.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|(root, _)| root.len())
            .map(|(_, mode)| *mode)
            .unwrap_or_default()
    }

    /// Mode for the system root: `/` or, on Windows, the `C:` drive
    #[must_use]
    pub fn system_root_mode(&self, windows: bool) -> PathType {
        self.lookup(if windows { "C:/" } else { "/" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_defaults_to_os() {
        let mapper = PathSpecMapper::new();
        assert_eq!(mapper.lookup("/etc/passwd"), PathType::Os);
        assert_eq!(mapper.lookup("C:/Windows"), PathType::Os);
    }

    #[test]
    fn test_drive_roots() {
        let mapper = PathSpecMapper::new();
        mapper.record("C:\\", "NTFS");
        mapper.record("D:/", "FAT32");
        assert_eq!(mapper.lookup("C:/Windows/System32"), PathType::Ntfs);
        assert_eq!(mapper.lookup("/C:/Users"), PathType::Ntfs);
        assert_eq!(mapper.lookup("C:\\Users"), PathType::Ntfs);
        assert_eq!(mapper.lookup("D:/data"), PathType::Os);
        assert_eq!(mapper.lookup("/CD:/x"), PathType::Os);
        assert_eq!(mapper.system_root_mode(true), PathType::Ntfs);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mapper = PathSpecMapper::new();
        mapper.record("/", "ext4");
        mapper.record("/mnt/evidence", "ntfs");
        assert_eq!(mapper.lookup("/mnt/evidence/file"), PathType::Ntfs);
        assert_eq!(mapper.lookup("/mnt/evidence"), PathType::Ntfs);
        assert_eq!(mapper.lookup("/mnt/evidence2/file"), PathType::Os);
        assert_eq!(mapper.lookup("/home"), PathType::Os);
        assert_eq!(mapper.system_root_mode(false), PathType::Os);
    }
}
