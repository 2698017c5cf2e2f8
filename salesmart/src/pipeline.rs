use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};

use salesmart_store::{StagingRow, SyncReport, Warehouse};
use serde::Serialize;

use crate::{
    config::Config,
    error::Result,
    report,
    staging::{self, QualityReport},
};

/// Outcome of one load of a source file.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub source: PathBuf,
    pub extracted: usize,
    pub dropped: usize,
    pub quality: QualityReport,
    pub synchronized: SyncReport,
    /// Rows left out because their invoice was already loaded.
    pub skipped: usize,
    pub loaded: u64,
    pub counts: BTreeMap<&'static str, i64>,
    /// Files of the processed snapshot written after the load.
    pub processed: Vec<PathBuf>,
}

/// A source file read and cleaned, ready for the warehouse.
#[derive(Debug, Clone)]
pub struct Staged {
    pub source: PathBuf,
    pub rows: Vec<StagingRow>,
    pub extracted: usize,
    pub dropped: usize,
    pub quality: QualityReport,
}

/// Extract, clean, synchronize the dimensions and load the facts.
#[derive(Clone)]
pub struct Pipeline {
    warehouse: Warehouse,
    config: Config,
}

impl Pipeline {
    pub fn new(warehouse: Warehouse, config: Config) -> Self {
        Self { warehouse, config }
    }

    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Source file used when none is given: see [`staging::find_csv`].
    pub fn default_source(&self) -> Result<PathBuf> {
        Ok(staging::find_csv(&self.config.data_paths.raw)?)
    }

    /// Reads and cleans `source` off the async runtime.
    pub async fn extract(&self, source: &Path) -> Result<Vec<StagingRow>> {
        let source = source.to_owned();
        let required = self.config.data_quality.required_columns.clone();

        let rows =
            tokio::task::spawn_blocking(move || staging::read_csv(&source, &required)).await??;

        Ok(rows)
    }

    /// Extracts `source`, or the default source of the raw directory, checks
    /// its quality and drops incomplete rows when configured to.
    pub async fn stage(&self, source: Option<&Path>) -> Result<Staged> {
        let source = match source {
            Some(source) => source.to_owned(),
            None => self.default_source()?,
        };

        let rows = self.extract(&source).await?;
        let extracted = rows.len();
        let quality = QualityReport::check(&rows, &self.config.data_quality);

        let (rows, dropped) = if self.config.etl.drop_incomplete {
            staging::drop_incomplete(rows)
        } else {
            (rows, 0)
        };

        Ok(Staged {
            source,
            rows,
            extracted,
            dropped,
            quality,
        })
    }

    /// Stages `source` and brings the dimensions up to date with it, without
    /// loading any fact.
    pub async fn synchronize(&self, source: Option<&Path>) -> Result<SyncReport> {
        let staged = self.stage(source).await?;

        Ok(self.warehouse.synchronize(&staged.rows).await?)
    }

    /// Loads `source`, or the default source of the raw directory.
    ///
    /// Running twice on the same file inserts nothing the second time: the
    /// dimensions already hold every key and, unless
    /// `skip_existing_invoices` is off, loaded invoices are left out.
    pub async fn run(&self, source: Option<&Path>) -> Result<LoadReport> {
        let Staged {
            source,
            rows,
            extracted,
            dropped,
            quality,
        } = self.stage(source).await?;

        tracing::info!(source = %source.display(), extracted, "load started");

        let synchronized = self.warehouse.synchronize(&rows).await?;

        let (rows, skipped) = if self.config.etl.skip_existing_invoices {
            self.skip_loaded(rows).await?
        } else {
            (rows, 0)
        };

        let loaded = self
            .warehouse
            .load_sales(&rows, self.config.etl.fact_batch_size)
            .await?;

        let counts = self.warehouse.counts().await?;
        let processed = self.save_processed().await;

        tracing::info!(
            extracted,
            dropped,
            skipped,
            loaded,
            dimensions = synchronized.total(),
            "load completed"
        );

        Ok(LoadReport {
            source,
            extracted,
            dropped,
            quality,
            synchronized,
            skipped,
            loaded,
            counts,
            processed,
        })
    }

    /// Snapshot of the star schema in the processed directory. A failure is
    /// logged and leaves the load untouched.
    async fn save_processed(&self) -> Vec<PathBuf> {
        if !self.config.etl.save_processed {
            return vec![];
        }

        match report::snapshot(&self.warehouse, &self.config.data_paths.processed).await {
            Ok(snapshot) => snapshot.written,
            Err(error) => {
                tracing::error!(%error, "failed to save the processed snapshot");
                vec![]
            }
        }
    }

    async fn skip_loaded(&self, rows: Vec<StagingRow>) -> Result<(Vec<StagingRow>, usize)> {
        let invoice_ids = rows
            .iter()
            .filter_map(|row| row.invoice_id.to_owned())
            .collect::<HashSet<_>>();

        let loaded = self
            .warehouse
            .existing_invoices(invoice_ids.into_iter().collect())
            .await?;

        if loaded.is_empty() {
            return Ok((rows, 0));
        }

        let total = rows.len();
        let rows = rows
            .into_iter()
            .filter(|row| {
                row.invoice_id
                    .as_ref()
                    .map_or(true, |id| !loaded.contains(id))
            })
            .collect::<Vec<_>>();

        let skipped = total - rows.len();
        tracing::info!(skipped, "already loaded invoices skipped");

        Ok((rows, skipped))
    }
}
