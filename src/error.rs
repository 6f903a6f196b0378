//! Error types for ctxrecon operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconError>;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Context not found: {name}")]
    ContextNotFound { name: String },

    #[error("Context error: {message}")]
    Context { message: String },

    #[error("Data source error: {message}")]
    DataSource { message: String },

    #[error("Job source error: {message}")]
    JobSource { message: String },

    #[error("Report error: {message}")]
    Report { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Context comparison already in progress")]
    RunInProgress,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),
}

impl ReconError {
    pub fn context(msg: impl Into<String>) -> Self {
        Self::Context {
            message: msg.into(),
        }
    }

    pub fn data_source(msg: impl Into<String>) -> Self {
        Self::DataSource {
            message: msg.into(),
        }
    }

    pub fn job_source(msg: impl Into<String>) -> Self {
        Self::JobSource {
            message: msg.into(),
        }
    }

    pub fn report(msg: impl Into<String>) -> Self {
        Self::Report {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    pub fn context_not_found(name: impl Into<String>) -> Self {
        Self::ContextNotFound { name: name.into() }
    }
}
