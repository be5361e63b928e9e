// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Write as _;

use diagnostics::*;
use wax::{Glob, Pattern};

use crate::error::{Error, Result};
use crate::format::{natural_size, readable_timestamp};
use crate::listing::{LsEntry, SortKey, sort_entries};
use crate::node::{DirNode, Node, NodeRef};
use crate::path::{self, ROOT};
use crate::row::{TimelineRow, decode_line};

/// How the endpoint spells paths in its timeline body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathDialect {
    #[default]
    Posix,
    /// Backslash separators and drive letters; paths are rooted under `/`
    Windows,
}

/// An in-memory replica of a remote filesystem built from timeline bodies.
///
/// The working directory is kept as a path and re-resolved on use, so a
/// refresh that replaces the subtree under it never leaves it dangling.
#[derive(Debug)]
pub struct EmulatedFs {
    dialect: PathDialect,
    root: DirNode,
    pwd: String,
}

impl EmulatedFs {
    /// An empty tree with a placeholder root stamped with freshness 0
    #[must_use]
    pub fn new(dialect: PathDialect) -> Self {
        Self {
            dialect,
            root: DirNode::root(0),
            pwd: ROOT.to_string(),
        }
    }

    /// Build a tree from a timeline body
    pub fn from_timeline(dialect: PathDialect, data: &[u8], freshness: i64) -> Result<Self> {
        let mut fs = Self::new(dialect);
        fs.root.freshness = freshness;
        _ = fs.parse_timeline(data, freshness)?;
        Ok(fs)
    }

    #[must_use]
    pub fn dialect(&self) -> PathDialect {
        self.dialect
    }

    #[must_use]
    pub fn pwd(&self) -> &str {
        &self.pwd
    }

    /// Freshness of the working directory
    #[must_use]
    pub fn pwd_freshness(&self) -> i64 {
        self.freshness_of(&self.pwd)
    }

    /// Freshness of a directory, or of the directory holding a file.
    ///
    /// Unknown paths report the root's freshness.
    #[must_use]
    pub fn freshness_of(&self, path: &str) -> i64 {
        let path = self.normalise_path(path);
        match self.resolve(&path) {
            Ok(NodeRef::Directory(dir)) => dir.freshness,
            Ok(NodeRef::File(_)) => match self.resolve(&path::dirname(&path)) {
                Ok(NodeRef::Directory(dir)) => dir.freshness,
                _ => self.root.freshness,
            },
            Err(_) => self.root.freshness,
        }
    }

    /// Merge a timeline body into the tree and return the number of rows read.
    ///
    /// Rows for paths that already have stats leave them untouched, so
    /// parsing the same body twice yields the same tree.
    pub fn parse_timeline(&mut self, data: &[u8], freshness: i64) -> Result<usize> {
        let mut count = 0;
        for raw in data.split(|b| *b == b'\n') {
            let line: Vec<u8> = raw.iter().copied().filter(|b| *b != b'\r').collect();
            if line.is_empty() || line.first() == Some(&b'#') {
                continue;
            }
            let line = match self.dialect {
                PathDialect::Windows => replace_double_backslash(&line),
                PathDialect::Posix => line,
            };
            let decoded = decode_line(&line)?;
            let mut row = TimelineRow::parse(&decoded)?;
            if self.dialect == PathDialect::Windows {
                row.path = format!("/{}", row.path);
            }
            self.add_row(row, freshness);
            count += 1;
        }

        if !self.exists(&self.pwd.clone(), true) {
            debug!("Working directory {pwd} vanished, resetting to root", pwd: self.pwd.clone());
            self.pwd = ROOT.to_string();
        }

        debug!("Parsed {count} timeline rows", count: count);
        Ok(count)
    }

    /// Insert one row, creating placeholder ancestors as needed
    pub fn add_row(&mut self, mut row: TimelineRow, freshness: i64) {
        let normalized = path::normalize(&row.path);
        if normalized == ROOT {
            row.path = normalized;
            self.root.stats = Some(row);
            self.root.freshness = freshness;
            return;
        }

        let parts: Vec<String> = path::components(&normalized).map(str::to_string).collect();
        let Some((leaf, ancestors)) = parts.split_last() else {
            return;
        };

        let mut current = &mut self.root;
        for name in ancestors {
            let Some(next) = current.upsert_dir(name, freshness) else {
                debug!("No directory at {name} for {path}", name: name.to_string(), path: normalized.clone());
                return;
            };
            current = next;
        }
        row.path = normalized.clone();
        current.attach(leaf, row, freshness);
    }

    /// Absolute, normalized form of a path; relative paths start at the pwd
    #[must_use]
    pub fn normalise_path(&self, path: &str) -> String {
        if path.is_empty() {
            ROOT.to_string()
        } else if path.starts_with('/') {
            path::normalize(path)
        } else {
            path::join(&self.pwd, path)
        }
    }

    /// Walk from the root; fails at the first missing component
    pub fn resolve(&self, path: &str) -> Result<NodeRef<'_>> {
        let mut current = &self.root;
        let mut components = path::components(path).peekable();
        while let Some(name) = components.next() {
            match current.child(name) {
                Some(Node::Directory(dir)) => current = dir,
                Some(Node::File(file)) if components.peek().is_none() => {
                    return Ok(NodeRef::File(file));
                }
                _ => return Err(Error::invalid_remote_path(path)),
            }
        }
        Ok(NodeRef::Directory(current))
    }

    /// True if the path resolves; with `dirs_only`, it must be a directory
    #[must_use]
    pub fn exists(&self, path: &str, dirs_only: bool) -> bool {
        let path = self.normalise_path(path);
        match self.resolve(&path) {
            Ok(node) => !dirs_only || node.is_dir(),
            Err(_) => false,
        }
    }

    /// List a directory, a single file, or a glob in the final component
    pub fn list(
        &self,
        path: Option<&str>,
        sort: SortKey,
        ascending: bool,
    ) -> Result<Vec<LsEntry>> {
        let target = self.normalise_path(path.unwrap_or(&self.pwd));

        let mut entries = if path::has_glob(&target) {
            self.list_glob(&target)?
        } else {
            match self.resolve(&target)? {
                file @ NodeRef::File(node) => vec![LsEntry::from_node(&node.name, file)],
                NodeRef::Directory(dir) => dir_entries(dir),
            }
        };

        sort_entries(&mut entries, sort, ascending);
        Ok(entries)
    }

    fn list_glob(&self, target: &str) -> Result<Vec<LsEntry>> {
        let parent = path::dirname(target);
        let pattern = path::basename(target).unwrap_or_default();
        if path::has_glob(&parent) {
            return Err(Error::glob_not_final(&parent, target));
        }

        let translated = shell_glob(pattern);
        let glob = Glob::new(&translated).map_err(|e| Error::Glob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        let NodeRef::Directory(dir) = self.resolve(&parent)? else {
            return Err(Error::invalid_remote_path(&parent));
        };

        Ok(dir_entries(dir)
            .into_iter()
            .filter(|entry| glob.is_match(entry.name.as_str()))
            .collect())
    }

    fn resolve_dir_mut(&mut self, path: &str) -> Option<&mut DirNode> {
        let mut current = &mut self.root;
        for name in path::components(path) {
            current = current.child_mut(name)?.as_dir_mut()?;
        }
        Some(current)
    }

    /// Change the working directory
    pub fn cd(&mut self, path: &str) -> Result<()> {
        let target = self.normalise_path(path);
        match self.resolve(&target)? {
            NodeRef::File(_) => Err(Error::is_a_file(&target)),
            NodeRef::Directory(_) => {
                self.pwd = target;
                Ok(())
            }
        }
    }

    /// Child names of a directory; directory names end with `/`
    pub fn children(&self, path: &str, dirs_only: bool) -> Result<Vec<String>> {
        let target = self.normalise_path(path);
        let NodeRef::Directory(dir) = self.resolve(&target)? else {
            return Err(Error::is_a_file(&target));
        };

        Ok(dir
            .children
            .iter()
            .filter(|(_, node)| !dirs_only || node.is_dir())
            .map(|(name, node)| {
                if node.is_dir() {
                    format!("{name}/")
                } else {
                    name.clone()
                }
            })
            .collect())
    }

    /// Full paths under `base` whose path matches a regular expression.
    ///
    /// An absent or empty base searches from the working directory.
    pub fn find(&self, base: Option<&str>, pattern: &str) -> Result<Vec<String>> {
        let regex = regex::Regex::new(pattern)?;
        let base = self.normalise_path(base.filter(|b| !b.is_empty()).unwrap_or(&self.pwd));

        let NodeRef::Directory(dir) = self.resolve(&base)? else {
            return Err(Error::is_a_file(&base));
        };
        let mut found = Vec::new();
        collect_matches(dir, &base, &regex, &mut found);
        found.sort();
        Ok(found)
    }

    /// Drop the subtree at `path` so a fresher timeline can replace it.
    ///
    /// Invalidating the root replaces it with an empty root stamped with
    /// `freshness`. Missing paths are ignored.
    pub fn invalidate(&mut self, path: &str, freshness: i64) {
        let target = self.normalise_path(path);
        if target == ROOT {
            self.root = DirNode::root(freshness);
            return;
        }

        let parent = path::dirname(&target);
        let Some(name) = path::basename(&target).map(str::to_string) else {
            return;
        };
        match self.resolve_dir_mut(&parent) {
            Some(dir) => {
                if dir.detach(&name).is_none() {
                    debug!("Nothing to invalidate at {path}", path: target.clone());
                }
            }
            None => debug!("Nothing to invalidate at {path}", path: target.clone()),
        }
    }

    /// Multi-line stat of a path from the cached timeline
    #[must_use]
    pub fn offline_stat(&self, path: &str) -> String {
        let target = self.normalise_path(path);
        let Ok(node) = self.resolve(&target) else {
            return format!("No such file or directory: {target}");
        };
        let default = TimelineRow::default();
        let stats = node.stats().unwrap_or(&default);

        let mut out = String::new();
        _ = writeln!(out, "{target}");
        _ = writeln!(out, "    mode:   {}", stats.mode);
        _ = writeln!(out, "    inode:  {}", stats.inode);
        _ = writeln!(out, "    uid:    {}", stats.uid);
        _ = writeln!(out, "    gid:    {}", stats.gid);
        _ = writeln!(out, "    size:   {} ({})", stats.size, natural_size(stats.size));
        _ = writeln!(out, "    atime:  {:?} - {}", stats.atime, readable_timestamp(stats.atime));
        _ = writeln!(out, "    mtime:  {:?} - {}", stats.mtime, readable_timestamp(stats.mtime));
        _ = writeln!(out, "    ctime:  {:?} - {}", stats.ctime, readable_timestamp(stats.ctime));
        _ = write!(out, "    crtime: {:?} - {}", stats.crtime, readable_timestamp(stats.crtime));
        out
    }
}

fn dir_entries(dir: &DirNode) -> Vec<LsEntry> {
    let mut entries = Vec::with_capacity(dir.children.len() + 1);
    entries.push(LsEntry::from_node(".", NodeRef::Directory(dir)));
    entries.extend(
        dir.children
            .iter()
            .map(|(name, node)| LsEntry::from_node(name, node.into())),
    );
    entries
}

/// Rewrite a shell wildcard as a wax glob over a single name.
///
/// Only `*`, `?` and bracket classes are special; every other wax
/// metacharacter is escaped, and runs of `*` collapse into one.
pub(crate) fn shell_glob(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut rest = pattern;
    while let Some(c) = rest.chars().next() {
        let mut taken = c.len_utf8();
        match c {
            '*' => {
                taken = rest.len() - rest.trim_start_matches('*').len();
                out.push('*');
            }
            '?' => out.push('?'),
            '[' => match class_len(rest) {
                Some(len) => {
                    out.push_str(&rest[..len]);
                    taken = len;
                }
                None => out.push_str("\\["),
            },
            c if wax::is_meta_character(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
        rest = &rest[taken..];
    }
    out
}

/// Length of the bracket class opening `text`, brackets included
fn class_len(text: &str) -> Option<usize> {
    let start = if text.starts_with("[!") { 2 } else { 1 };
    let close = text.get(start..)?.find(']')?;
    (close > 0).then_some(start + close + 1)
}

fn collect_matches(dir: &DirNode, base: &str, regex: &regex::Regex, found: &mut Vec<String>) {
    for (name, node) in &dir.children {
        let full = if base == ROOT {
            format!("/{name}")
        } else {
            format!("{base}/{name}")
        };
        if let Node::Directory(child) = node {
            collect_matches(child, &full, regex, found);
        }
        if regex.is_match(&full) {
            found.push(full);
        }
    }
}

/// Replace each two-byte `\\` sequence with `/`
fn replace_double_backslash(line: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len());
    let mut idx = 0;
    while idx < line.len() {
        if line[idx] == b'\\' && line.get(idx + 1) == Some(&b'\\') {
            out.push(b'/');
            idx += 2;
        } else {
            out.push(line[idx]);
            idx += 1;
        }
    }
    out
}
