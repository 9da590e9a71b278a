use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("invalid order marker key '{key}': {source}")]
    MarkerPattern {
        key: String,
        #[source]
        source: regex::Error,
    },
}

/// Catalog resolution errors.
///
/// Raised when an order references a code the catalog cannot turn into a
/// deliverable plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown catalog code: {0}")]
    UnknownCode(String),

    #[error("choice bundle '{0}' has no deliverable options")]
    EmptyChoice(String),

    #[error("catalog entry '{0}' has no price")]
    Unpriced(String),
}

/// Errors reading catalog, bundle and template files.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Marketplace collaborator errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("marketplace request failed: {0}")]
    Request(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The marketplace client does not support this call shape.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Session pool errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no configured session is alive")]
    NoAliveSessions,

    #[error("no sessions configured")]
    NoSessions,

    #[error("session worker timed out after {timeout_ms}ms during {op}")]
    Timeout { op: &'static str, timeout_ms: u64 },

    #[error("session worker is not running")]
    WorkerGone,

    #[error("failed to start session worker: {0}")]
    Runtime(#[source] std::io::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
