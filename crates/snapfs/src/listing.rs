// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::cmp::Ordering;
use std::fmt;

use crate::format::readable_timestamp;
use crate::node::NodeRef;
use crate::row::TimelineRow;

/// Sort order for directory listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Directories first, then by name
    #[default]
    Name,
    Size,
    MTime,
}

/// One line of an `ls`-style listing
#[derive(Debug, Clone, PartialEq)]
pub struct LsEntry {
    pub name: String,
    pub is_dir: bool,
    pub mode: String,
    pub uid: i64,
    pub gid: i64,
    pub size: u64,
    pub mtime: f64,
}

impl LsEntry {
    pub(crate) fn from_node(name: &str, node: NodeRef<'_>) -> Self {
        let default = TimelineRow::default();
        let stats = node.stats().unwrap_or(&default);
        Self {
            name: name.to_string(),
            is_dir: node.is_dir(),
            mode: stats.mode.clone(),
            uid: stats.uid,
            gid: stats.gid,
            size: stats.size,
            mtime: stats.mtime,
        }
    }

    fn compare(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Name => other
                .is_dir
                .cmp(&self.is_dir)
                .then_with(|| self.name.cmp(&other.name)),
            SortKey::Size => self.size.cmp(&other.size),
            SortKey::MTime => self.mtime.total_cmp(&other.mtime),
        }
    }
}

impl fmt::Display for LsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>8} {:>8} {:>12} {} {}",
            self.mode,
            self.uid,
            self.gid,
            self.size,
            readable_timestamp(self.mtime),
            self.name
        )
    }
}

/// Sort a listing in place; descending order reverses the final order
pub fn sort_entries(entries: &mut [LsEntry], key: SortKey, ascending: bool) {
    entries.sort_by(|a, b| a.compare(b, key));
    if !ascending {
        entries.reverse();
    }
}
