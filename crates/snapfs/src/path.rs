// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! String path helpers for remote paths.
//!
//! Remote paths always use `/` separators once a timeline row has been
//! read, whatever the endpoint's OS, so these helpers work on `str` rather
//! than the host's `std::path` dialect.

pub const ROOT: &str = "/";

/// Collapse `.`, `..` and repeated separators into an absolute path.
///
/// `..` at the root stays at the root.
#[must_use]
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                _ = parts.pop();
            }
            name => parts.push(name),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Join a relative path onto an absolute base and normalize the result
#[must_use]
pub fn join(base: &str, relative: &str) -> String {
    normalize(&format!("{base}/{relative}"))
}

/// Non-empty components of an already-normalized absolute path
pub fn components(path: &str) -> impl DoubleEndedIterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Final component of a path, or `None` for the root
#[must_use]
pub fn basename(path: &str) -> Option<&str> {
    components(path).next_back()
}

/// Everything before the final component; the root for top-level entries
#[must_use]
pub fn dirname(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => ROOT.to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// True when the path carries a shell wildcard
#[must_use]
pub fn has_glob(path: &str) -> bool {
    path.contains(['*', '?'])
}
