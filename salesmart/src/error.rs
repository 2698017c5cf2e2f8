use std::path::PathBuf;

use salesmart_store::StoreError;

use crate::{config::ConfigError, staging::StagingError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("`{0}` is not a supported database url, consider memory, sqlite: or postgres://")]
    UnsupportedUrl(String),

    #[error("failed to write `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv `{0}`")]
    Csv(#[from] csv::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
