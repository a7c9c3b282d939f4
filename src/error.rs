// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

/// Error type for processing a file or package.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The source (or a transformed file being merged) does not parse.
    /// `partial` holds whatever output had been produced so far.
    #[error("{file}: {message}")]
    Parse {
        file: String,
        message: String,
        partial: String,
    },
    /// Merge of a package without any matching file
    #[error("package `{0}` has no files to merge")]
    NothingToMerge(String),
    /// Reading or writing failed
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub fn parse(file: impl Into<String>, err: anyhow::Error, partial: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: format!("{err:#}"),
            partial: partial.into(),
        }
    }

    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Output produced before the failure, if any.
    pub fn partial(&self) -> Option<&str> {
        match self {
            Self::Parse { partial, .. } if !partial.is_empty() => Some(partial),
            _ => None,
        }
    }
}

/// Error type for locating a package directory.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The go tool could not be run
    #[error("cannot run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// Package not found by the go tool
    #[error("package `{package}` not found: {stderr}")]
    NotFound { package: String, stderr: String },
    /// Fetching the package failed
    #[error("`go get {package}` failed: {stderr}")]
    Fetch { package: String, stderr: String },
}
