// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! An offline, in-memory view of a remote endpoint's filesystem.
//!
//! The tree is built from timeline bodies collected from the endpoint and
//! answers `ls`, `cd`, `find` and `stat` style queries without contacting
//! it. Subtrees can be invalidated and re-populated from fresher
//! timelines.

mod error;
mod format;
mod fs;
mod listing;
mod node;
pub mod path;
mod row;

pub use error::{Error, Result};
pub use format::{natural_size, readable_timestamp};
pub use fs::{EmulatedFs, PathDialect};
pub use listing::{LsEntry, SortKey, sort_entries};
pub use node::{DirNode, FileNode, Node, NodeRef};
pub use row::TimelineRow;

#[cfg(test)]
mod tests;
