use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::{
    error::{Result, StoreError},
    model::{DimensionKey, DimensionKind, DimensionRow, NewSale, Sale, SalesSummary, Table},
};

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "sql")]
mod sql;

#[cfg(feature = "memory")]
pub use memory::*;
#[cfg(feature = "sql")]
pub use sql::*;

#[async_trait]
pub trait Engine: DynClone + Send + Sync {
    /// Creates the star schema if it does not exist yet.
    async fn migrate(&self) -> Result<()>;

    /// Inserts one row per key that `kind` does not hold yet and returns how
    /// many rows were added. Check and insert happen atomically, so
    /// concurrent callers never produce two rows for the same natural key.
    async fn insert_missing(&self, kind: DimensionKind, keys: Vec<DimensionKey>) -> Result<u64>;

    async fn dimension(&self, kind: DimensionKind) -> Result<Vec<DimensionRow>>;

    /// The subset of `invoice_ids` already present in `fact_sales`.
    async fn existing_invoices(&self, invoice_ids: Vec<String>) -> Result<Vec<String>>;

    /// Appends fact rows, all or nothing.
    async fn insert_sales(&self, sales: Vec<NewSale>) -> Result<u64>;

    async fn sales(&self) -> Result<Vec<Sale>>;

    async fn summary(&self) -> Result<Vec<SalesSummary>>;

    async fn count(&self, table: Table) -> Result<i64>;
}

dyn_clone::clone_trait_object!(Engine);

/// Fails on the first key that does not belong to `kind`.
pub(crate) fn check_keys(kind: DimensionKind, keys: &[DimensionKey]) -> Result<()> {
    match keys.iter().find(|key| key.kind() != kind) {
        Some(key) => Err(StoreError::WrongDimension {
            table: kind.table(),
            found: key.kind().table(),
            key: key.to_string(),
        }),
        None => Ok(()),
    }
}
