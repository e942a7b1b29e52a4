//! Error taxonomy for the mutation engine.
//!
//! Three families exist and they are handled very differently:
//!
//! * [`ConfigurationError`] is fatal. It is raised while profiles and catalogues are being
//!   assembled and is surfaced to the caller at startup.
//! * [`StrategyError`] is local to one strategy application. The composition engine logs it
//!   and moves on to the next entry of the schedule.
//! * [`PersistenceWarning`] is never an error for the caller. A damaged outcome memory
//!   degrades to an empty (or partial) table and the warning is logged.

use std::path::PathBuf;

use thiserror::Error;

/// An invalid profile, catalogue or configuration file.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("profile `{profile}` already contains a strategy named `{name}`")]
    DuplicateStrategy { profile: String, name: String },

    #[error("profile `{profile}` references unknown strategy `{name}`")]
    UnknownStrategy { profile: String, name: String },

    #[error("unknown profile `{0}` (expected one of: general, reinforcement, deep)")]
    UnknownProfile(String),

    #[error("unable to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid profile configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A strategy could not operate on a request it claims to support.
///
/// Returning an empty variant list is the correct answer for an *inapplicable* request;
/// this error is reserved for requests that are malformed from the strategy's point of view.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("`{url}` is not a valid absolute URL: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request body is not valid UTF-8 but {strategy} needs text")]
    BinaryBody { strategy: &'static str },

    #[error("{0}")]
    Malformed(String),
}

/// A recoverable problem with the persisted outcome memory.
#[derive(Debug, Error)]
pub enum PersistenceWarning {
    #[error("outcome memory {} does not exist, starting with an empty table", path.display())]
    Missing { path: PathBuf },

    #[error("outcome memory {} could not be read, starting with an empty table: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("skipping corrupt record at {}:{line}: {reason}", path.display())]
    CorruptRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}
