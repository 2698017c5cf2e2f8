//! Runtime configuration of the warehouse loader.
//!
//! Values come from an optional TOML file, then from the environment. Every
//! section has defaults, so an empty file (or no file at all) is valid.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/warehouse.db?mode=rwc";
pub const DEFAULT_FACT_BATCH_SIZE: usize = 50;

/// Columns the supermarket export must provide.
pub const SOURCE_COLUMNS: [&str; 17] = [
    "Invoice ID",
    "Branch",
    "City",
    "Customer type",
    "Gender",
    "Product line",
    "Unit price",
    "Quantity",
    "Tax 5%",
    "Sales",
    "Date",
    "Time",
    "Payment",
    "cogs",
    "gross margin percentage",
    "gross income",
    "Rating",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable `{name}` has an invalid value `{value}`")]
    Env { name: &'static str, value: String },

    #[error("{0}")]
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `memory`, `sqlite:...` or `postgres://...`
    #[validate(length(min = 1))]
    pub url: String,

    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_owned(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    /// Directory scanned for the source CSV.
    pub raw: PathBuf,
    /// Directory receiving a snapshot of the star schema after each load.
    pub processed: PathBuf,
    /// Directory receiving the exports.
    pub warehouse: PathBuf,
    /// Directory of the CLI log file.
    pub logs: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            raw: PathBuf::from("data/raw"),
            processed: PathBuf::from("data/processed"),
            warehouse: PathBuf::from("data/warehouse"),
            logs: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EtlConfig {
    #[validate(range(min = 1, max = 10000))]
    pub fact_batch_size: usize,

    /// Drop staging rows with missing values instead of failing the load.
    pub drop_incomplete: bool,

    /// Leave out rows whose invoice is already in `fact_sales`.
    pub skip_existing_invoices: bool,

    /// Write the dimensions and facts to the processed directory after a load.
    pub save_processed: bool,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            fact_batch_size: DEFAULT_FACT_BATCH_SIZE,
            drop_incomplete: true,
            skip_existing_invoices: true,
            save_processed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_sales_range"))]
pub struct DataQualityConfig {
    pub min_sales_amount: f64,
    pub max_sales_amount: f64,

    #[validate(length(min = 1))]
    pub required_columns: Vec<String>,
}

impl Default for DataQualityConfig {
    fn default() -> Self {
        Self {
            min_sales_amount: 0.0,
            max_sales_amount: 10000.0,
            required_columns: SOURCE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

fn validate_sales_range(quality: &DataQualityConfig) -> Result<(), ValidationError> {
    if quality.min_sales_amount > quality.max_sales_amount {
        return Err(ValidationError::new("min_sales_amount_above_max"));
    }

    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate]
    pub database: DatabaseConfig,
    pub data_paths: DataPaths,
    #[validate]
    pub etl: EtlConfig,
    #[validate]
    pub data_quality: DataQualityConfig,
}

impl Config {
    /// Reads `path` when given, applies the process environment and
    /// validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let config = config.with_env(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Overrides the database settings from environment variables read
    /// through `var`.
    ///
    /// `DATABASE_URL` wins. Otherwise any of `DB_HOST`, `DB_PORT`, `DB_NAME`,
    /// `DB_USER` or `DB_PASSWORD` selects PostgreSQL, with defaults for the
    /// parts left unset.
    pub fn with_env<F>(mut self, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("DATABASE_URL") {
            self.database.url = url;
            return Ok(self);
        }

        let parts = ["DB_HOST", "DB_PORT", "DB_NAME", "DB_USER", "DB_PASSWORD"];
        if parts.iter().all(|name| var(name).is_none()) {
            return Ok(self);
        }

        let host = var("DB_HOST").unwrap_or_else(|| "localhost".to_owned());
        let port = match var("DB_PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::Env {
                name: "DB_PORT",
                value,
            })?,
            None => 5432,
        };
        let name = var("DB_NAME").unwrap_or_else(|| "supermarket_dw".to_owned());
        let user = encode_userinfo(&var("DB_USER").unwrap_or_else(|| "postgres".to_owned()));

        self.database.url = match var("DB_PASSWORD") {
            Some(password) => {
                let password = encode_userinfo(&password);
                format!("postgres://{user}:{password}@{host}:{port}/{name}")
            }
            None => format!("postgres://{user}@{host}:{port}/{name}"),
        };

        Ok(self)
    }
}

/// Percent-encodes everything but the unreserved characters, so a user name
/// or password can sit in the authority of a URL.
fn encode_userinfo(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());

    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }

    encoded
}

/// Programmatic construction of a validated [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = url.into();
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.config.database.max_connections = max;
        self
    }

    pub fn raw_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_paths.raw = dir.into();
        self
    }

    pub fn processed_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_paths.processed = dir.into();
        self
    }

    pub fn warehouse_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_paths.warehouse = dir.into();
        self
    }

    pub fn fact_batch_size(mut self, size: usize) -> Self {
        self.config.etl.fact_batch_size = size;
        self
    }

    pub fn drop_incomplete(mut self, drop: bool) -> Self {
        self.config.etl.drop_incomplete = drop;
        self
    }

    pub fn skip_existing_invoices(mut self, skip: bool) -> Self {
        self.config.etl.skip_existing_invoices = skip;
        self
    }

    pub fn save_processed(mut self, save: bool) -> Self {
        self.config.etl.save_processed = save;
        self
    }

    pub fn sales_range(mut self, min: f64, max: f64) -> Self {
        self.config.data_quality.min_sales_amount = min;
        self.config.data_quality.max_sales_amount = max;
        self
    }

    pub fn required_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.data_quality.required_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;

        Ok(self.config)
    }
}
