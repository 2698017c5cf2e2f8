use crate::model::DimensionKind;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("staging row {row} is missing `{field}` required by {table}")]
    MissingField {
        table: &'static str,
        row: usize,
        field: &'static str,
    },

    #[error("staging row {row} has an invalid `{field}` for {table}: {reason}")]
    InvalidField {
        table: &'static str,
        row: usize,
        field: &'static str,
        reason: String,
    },

    #[error("{table} has no row for key {key}")]
    MissingDimension { table: &'static str, key: String },

    #[error("{table} cannot store the {found} key {key}")]
    WrongDimension {
        table: &'static str,
        found: &'static str,
        key: String,
    },

    #[error("invoice `{0}` already exists in fact_sales")]
    DuplicateInvoice(String),

    #[error("{table} rejected the write: {message}")]
    Constraint { table: &'static str, message: String },

    #[error("failed to synchronize {}", describe(.0))]
    Synchronize(Vec<DimensionFailure>),

    #[error("`{0}` is not supported, consider using SQLite or PostgreSQL")]
    UnsupportedDatabase(&'static str),

    #[cfg(feature = "sql")]
    #[error("{table} write failed: {source}")]
    Write {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[cfg(feature = "sql")]
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// A staging row lacks or carries an unusable attribute.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StoreError::MissingField { .. }
                | StoreError::InvalidField { .. }
                | StoreError::WrongDimension { .. }
        )
    }

    /// A fact write would break referential integrity or invoice uniqueness.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            StoreError::MissingDimension { .. }
                | StoreError::DuplicateInvoice(_)
                | StoreError::Constraint { .. }
        )
    }

    pub fn is_storage(&self) -> bool {
        match self {
            #[cfg(feature = "sql")]
            StoreError::Sqlx(_) | StoreError::Write { .. } => true,
            StoreError::UnsupportedDatabase(_) => true,
            _ => false,
        }
    }
}

/// A dimension whose synchronization aborted, together with the cause.
#[derive(Debug)]
pub struct DimensionFailure {
    pub dimension: DimensionKind,
    pub error: StoreError,
}

fn describe(failures: &[DimensionFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.dimension.table(), failure.error))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, StoreError>;
