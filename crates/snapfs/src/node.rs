// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use crate::row::TimelineRow;

/// A node in the emulated tree: either a file or a directory
#[derive(Debug, Clone)]
pub enum Node {
    File(FileNode),
    Directory(DirNode),
}

#[derive(Debug, Clone)]
pub struct FileNode {
    pub name: String,
    pub stats: TimelineRow,
}

/// A directory owns its children by name.
///
/// `stats` is `None` for placeholders created for ancestors that the
/// timeline never listed on their own.
#[derive(Debug, Clone, Default)]
pub struct DirNode {
    pub name: String,
    pub stats: Option<TimelineRow>,
    pub children: BTreeMap<String, Node>,
    pub freshness: i64,
}

/// A borrowed view of a resolved path
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    File(&'a FileNode),
    Directory(&'a DirNode),
}

impl<'a> From<&'a Node> for NodeRef<'a> {
    fn from(node: &'a Node) -> Self {
        match node {
            Node::File(f) => NodeRef::File(f),
            Node::Directory(d) => NodeRef::Directory(d),
        }
    }
}

impl<'a> NodeRef<'a> {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeRef::Directory(_))
    }

    #[must_use]
    pub fn stats(&self) -> Option<&'a TimelineRow> {
        match self {
            NodeRef::File(f) => Some(&f.stats),
            NodeRef::Directory(d) => d.stats.as_ref(),
        }
    }
}

impl Node {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Node::File(f) => &f.name,
            Node::Directory(d) => &d.name,
        }
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    #[must_use]
    pub fn as_dir(&self) -> Option<&DirNode> {
        match self {
            Node::Directory(d) => Some(d),
            Node::File(_) => None,
        }
    }

    pub fn as_dir_mut(&mut self) -> Option<&mut DirNode> {
        match self {
            Node::Directory(d) => Some(d),
            Node::File(_) => None,
        }
    }

    /// Stats of the node; `None` only for placeholder directories
    #[must_use]
    pub fn stats(&self) -> Option<&TimelineRow> {
        match self {
            Node::File(f) => Some(&f.stats),
            Node::Directory(d) => d.stats.as_ref(),
        }
    }
}

impl DirNode {
    /// An unlisted root stamped with the given freshness
    #[must_use]
    pub fn root(freshness: i64) -> Self {
        Self {
            freshness,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.get_mut(name)
    }

    /// Return the child directory `name`, creating a placeholder when absent.
    ///
    /// A file standing where a directory is needed is turned into a
    /// directory that keeps the file's stats.
    pub fn upsert_dir(&mut self, name: &str, freshness: i64) -> Option<&mut DirNode> {
        let slot = self
            .children
            .entry(name.to_string())
            .or_insert_with(|| Node::Directory(DirNode::placeholder(name, freshness)));

        if let Node::File(file) = slot {
            let mut dir = DirNode::placeholder(name, freshness);
            dir.stats = Some(std::mem::take(&mut file.stats));
            *slot = Node::Directory(dir);
        }
        slot.as_dir_mut()
    }

    fn placeholder(name: &str, freshness: i64) -> Self {
        Self {
            name: name.to_string(),
            freshness,
            ..Default::default()
        }
    }

    /// Attach a listed entry.
    ///
    /// A new entry becomes a file or directory depending on its mode. An
    /// existing placeholder gains the row's stats; stats that are already
    /// set are never overwritten.
    pub fn attach(&mut self, name: &str, row: TimelineRow, freshness: i64) {
        match self.children.get_mut(name) {
            None => {
                let node = if row.is_dir() {
                    Node::Directory(DirNode {
                        name: name.to_string(),
                        stats: Some(row),
                        children: BTreeMap::new(),
                        freshness,
                    })
                } else {
                    Node::File(FileNode {
                        name: name.to_string(),
                        stats: row,
                    })
                };
                _ = self.children.insert(name.to_string(), node);
            }
            Some(Node::Directory(dir)) => {
                if dir.stats.is_none() {
                    dir.stats = Some(row);
                }
            }
            Some(Node::File(_)) => {}
        }
    }

    /// Remove and return a child
    pub fn detach(&mut self, name: &str) -> Option<Node> {
        self.children.remove(name)
    }
}
