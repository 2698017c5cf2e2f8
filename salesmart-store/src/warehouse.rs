use std::collections::{BTreeMap, BTreeSet, HashSet};

use futures_util::future::join_all;
use serde::Serialize;

use crate::{
    engine::Engine,
    error::{DimensionFailure, Result, StoreError},
    model::{DimensionKind, DimensionRow, NewSale, Sale, SalesSummary, Table},
    staging::{KeyLookup, StagingRow},
};

/// Rows added per dimension by one `synchronize` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub inserted: BTreeMap<DimensionKind, u64>,
}

impl SyncReport {
    pub fn get(&self, kind: DimensionKind) -> u64 {
        self.inserted.get(&kind).copied().unwrap_or_default()
    }

    pub fn total(&self) -> u64 {
        self.inserted.values().sum()
    }
}

#[derive(Clone)]
pub struct Warehouse {
    pub(crate) engine: Box<dyn Engine>,
}

impl Warehouse {
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self {
            engine: Box::new(engine),
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        self.engine.migrate().await
    }

    /// Makes sure every natural key found in `rows` has a row in its
    /// dimension table.
    ///
    /// The five dimensions are synchronized concurrently and independently:
    /// a failing dimension does not prevent the others from completing. The
    /// call fails if at least one dimension failed, listing each of them.
    pub async fn synchronize(&self, rows: &[StagingRow]) -> Result<SyncReport> {
        let results = join_all(DimensionKind::ALL.into_iter().map(|kind| async move {
            (kind, self.synchronize_dimension(kind, rows).await)
        }))
        .await;

        let mut report = SyncReport::default();
        let mut failures = vec![];

        for (dimension, result) in results {
            match result {
                Ok(inserted) => {
                    report.inserted.insert(dimension, inserted);
                }
                Err(error) => {
                    tracing::error!(%dimension, %error, "failed to synchronize dimension");
                    failures.push(DimensionFailure { dimension, error });
                }
            }
        }

        if !failures.is_empty() {
            return Err(StoreError::Synchronize(failures));
        }

        Ok(report)
    }

    /// Inserts the natural keys of `kind` present in `rows` and not stored
    /// yet. Returns the number of rows added.
    pub async fn synchronize_dimension(
        &self,
        kind: DimensionKind,
        rows: &[StagingRow],
    ) -> Result<u64> {
        let keys = rows
            .iter()
            .enumerate()
            .map(|(row, staging)| staging.key(kind, row))
            .collect::<Result<BTreeSet<_>>>()?;

        let distinct = keys.len();
        let inserted = self
            .engine
            .insert_missing(kind, keys.into_iter().collect())
            .await?;

        tracing::info!(dimension = %kind, distinct, inserted, "dimension synchronized");

        Ok(inserted)
    }

    /// Natural key to surrogate id for every stored dimension row.
    pub async fn lookup(&self) -> Result<KeyLookup> {
        let mut lookup = KeyLookup::default();

        for kind in DimensionKind::ALL {
            for row in self.engine.dimension(kind).await? {
                lookup.insert(row.key(), row.id());
            }
        }

        Ok(lookup)
    }

    /// Resolves `rows` against the dimensions and appends them to
    /// `fact_sales`, `batch_size` rows per write.
    ///
    /// Every row is resolved before the first write, so a validation or
    /// integrity error leaves the fact table untouched. A storage error in a
    /// later batch keeps the batches already written.
    pub async fn load_sales(&self, rows: &[StagingRow], batch_size: usize) -> Result<u64> {
        let lookup = self.lookup().await?;
        let mut invoices = HashSet::new();
        let mut sales = Vec::with_capacity(rows.len());

        for (row, staging) in rows.iter().enumerate() {
            let sale = staging.to_new_sale(row, &lookup)?;

            if !invoices.insert(sale.invoice_id.to_owned()) {
                return Err(StoreError::DuplicateInvoice(sale.invoice_id));
            }

            sales.push(sale);
        }

        let mut inserted = 0;

        for (batch, chunk) in sales.chunks(batch_size.max(1)).enumerate() {
            inserted += self.engine.insert_sales(chunk.to_vec()).await?;

            tracing::debug!(batch, rows = chunk.len(), "fact batch written");
        }

        tracing::info!(inserted, "fact_sales loaded");

        Ok(inserted)
    }

    /// Appends already resolved fact rows in a single write.
    pub async fn insert_sales(&self, sales: Vec<NewSale>) -> Result<u64> {
        self.engine.insert_sales(sales).await
    }

    /// Invoices of `invoice_ids` already present in `fact_sales`.
    pub async fn existing_invoices(&self, invoice_ids: Vec<String>) -> Result<HashSet<String>> {
        Ok(self
            .engine
            .existing_invoices(invoice_ids)
            .await?
            .into_iter()
            .collect())
    }

    /// Row count of every table of the star schema.
    pub async fn counts(&self) -> Result<BTreeMap<&'static str, i64>> {
        let mut counts = BTreeMap::new();

        for table in Table::ALL {
            counts.insert(table.name(), self.engine.count(table).await?);
        }

        Ok(counts)
    }

    pub async fn dimension(&self, kind: DimensionKind) -> Result<Vec<DimensionRow>> {
        self.engine.dimension(kind).await
    }

    pub async fn sales(&self) -> Result<Vec<Sale>> {
        self.engine.sales().await
    }

    pub async fn summary(&self) -> Result<Vec<SalesSummary>> {
        self.engine.summary().await
    }
}
