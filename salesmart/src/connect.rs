use salesmart_store::Warehouse;

use crate::error::{PipelineError, Result};

/// Opens the warehouse behind `url` and makes sure its schema exists.
///
/// `memory` keeps everything in process, `sqlite:` and `postgres://` urls are
/// handed to `sqlx`.
pub async fn connect(url: &str, max_connections: u32) -> Result<Warehouse> {
    let scheme = url.split(':').next().unwrap_or_default();
    let warehouse = open(url, max_connections).await?;

    warehouse.migrate().await?;

    tracing::info!(scheme, "warehouse ready");

    Ok(warehouse)
}

#[cfg_attr(not(feature = "postgres"), allow(unused_variables))]
async fn open(url: &str, max_connections: u32) -> Result<Warehouse> {
    #[cfg(feature = "memory")]
    if url == "memory" || url == "memory://" {
        return Ok(Warehouse::memory());
    }

    #[cfg(feature = "sqlite")]
    if url.starts_with("sqlite:") {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(url)
            .await
            .map_err(salesmart_store::StoreError::from)?;

        return Ok(Warehouse::new(salesmart_store::Sqlite::from(pool)));
    }

    #[cfg(feature = "postgres")]
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(salesmart_store::StoreError::from)?;

        return Ok(Warehouse::new(salesmart_store::Postgres::from(pool)));
    }

    Err(PipelineError::UnsupportedUrl(url.to_owned()))
}
