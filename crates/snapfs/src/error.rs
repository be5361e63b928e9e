// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the emulated filesystem
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    #[error("Is a file: {0}")]
    IsAFile(String),

    /// A wildcard appeared before the final path component
    #[error("Globbing only supported for the final path component: {path} (wildcard in {prefix})")]
    GlobNotFinal { prefix: String, path: String },

    #[error("Invalid glob {pattern}: {message}")]
    Glob { pattern: String, message: String },

    #[error("Invalid search pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Could not decode timeline line {line:?}: {reason}")]
    TimelineDecoding { line: String, reason: String },
}

impl Error {
    pub fn invalid_remote_path<S: AsRef<str>>(path: S) -> Self {
        Error::InvalidRemotePath(path.as_ref().to_string())
    }

    pub fn is_a_file<S: AsRef<str>>(path: S) -> Self {
        Error::IsAFile(path.as_ref().to_string())
    }

    pub fn glob_not_final<S: AsRef<str>, T: AsRef<str>>(prefix: S, path: T) -> Self {
        Error::GlobNotFinal {
            prefix: prefix.as_ref().to_string(),
            path: path.as_ref().to_string(),
        }
    }

    pub fn timeline_decoding<S: AsRef<str>, R: ToString>(line: S, reason: R) -> Self {
        Error::TimelineDecoding {
            line: line.as_ref().to_string(),
            reason: reason.to_string(),
        }
    }
}
