//! Error taxonomy for a newsbot run.
//!
//! Only [`Error::SchemaSetup`] (and configuration/interrupt errors raised
//! before or around the pipeline) end a run. Every other variant is caught by
//! the narrowest loop that produced it, logged, and counted.

use std::fmt;
use thiserror::Error;

/// Transport-level cause of a failed store call.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed store response: {0}")]
    Malformed(String),
}

/// Which write a [`Error::StoreWrite`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Archive,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOp::Create => f.write_str("create"),
            WriteOp::Archive => f.write_str("archive"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("schema setup failed: {0}")]
    SchemaSetup(#[source] StoreError),

    #[error("{feed}: fetch failed: {reason}")]
    FeedFetch { feed: String, reason: String },

    #[error("{feed}: could not parse article: {reason}")]
    RecordParse { feed: String, reason: String },

    #[error("{op} failed for '{target}': {source}")]
    StoreWrite {
        op: WriteOp,
        target: String,
        #[source]
        source: StoreError,
    },

    #[error("store query failed: {0}")]
    StoreRead(#[source] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("process interrupted by user")]
    Interrupted,
}

impl Error {
    pub fn create_failed(title: &str, source: StoreError) -> Self {
        Error::StoreWrite {
            op: WriteOp::Create,
            target: title.to_string(),
            source,
        }
    }

    pub fn archive_failed(id: &str, source: StoreError) -> Self {
        Error::StoreWrite {
            op: WriteOp::Archive,
            target: id.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
