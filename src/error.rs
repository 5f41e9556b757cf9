use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Errors returned by a pool API gateway.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Pool API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pool API returned status {0}")]
    Status(u16),

    #[error("Pool API error: {0}")]
    Api(String),

    #[error("Pool API response has no result")]
    EmptyResult,

    #[error("Pool API call timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored balance is not a number: {0}")]
    InvalidBalance(String),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Mail request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Failure of a single job. Never retried.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("Job queue is closed")]
    QueueClosed,
}

impl JobError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, JobError::Fetch(FetchError::Timeout(_)))
    }
}
