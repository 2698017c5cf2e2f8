use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    engine::{check_keys, Engine},
    error::{Result, StoreError},
    model::{DimensionKey, DimensionKind, DimensionRow, NewSale, Sale, SalesSummary, Table},
    warehouse::Warehouse,
};

#[derive(Debug, Default)]
struct Tables {
    dimensions: HashMap<DimensionKind, Vec<DimensionRow>>,
    sales: Vec<Sale>,
}

#[derive(Debug, Clone, Default)]
pub struct Memory(Arc<RwLock<Tables>>);

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Warehouse {
    pub fn memory() -> Self {
        Warehouse::new(Memory::default())
    }
}

#[async_trait]
impl Engine for Memory {
    async fn migrate(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_missing(&self, kind: DimensionKind, keys: Vec<DimensionKey>) -> Result<u64> {
        check_keys(kind, &keys)?;

        if keys.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut data = self.0.write();
        let rows = data.dimensions.entry(kind).or_default();

        let mut existing = rows.iter().map(|row| row.key()).collect::<HashSet<_>>();
        let mut inserted = 0;

        for key in keys {
            if !existing.insert(key.clone()) {
                continue;
            }

            let id = i32::try_from(rows.len() + 1).map_err(|_| StoreError::Constraint {
                table: kind.table(),
                message: "surrogate key space exhausted".to_owned(),
            })?;

            rows.push(DimensionRow::new(id, key, now));
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn dimension(&self, kind: DimensionKind) -> Result<Vec<DimensionRow>> {
        Ok(self
            .0
            .read()
            .dimensions
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn existing_invoices(&self, invoice_ids: Vec<String>) -> Result<Vec<String>> {
        let data = self.0.read();
        let stored = data
            .sales
            .iter()
            .map(|sale| sale.invoice_id.as_str())
            .collect::<HashSet<_>>();

        Ok(invoice_ids
            .into_iter()
            .filter(|id| stored.contains(id.as_str()))
            .collect())
    }

    async fn insert_sales(&self, sales: Vec<NewSale>) -> Result<u64> {
        if sales.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let mut data = self.0.write();

        let references = DimensionKind::ALL
            .into_iter()
            .map(|kind| {
                let ids = data
                    .dimensions
                    .get(&kind)
                    .map(|rows| rows.iter().map(|row| row.id()).collect::<HashSet<_>>())
                    .unwrap_or_default();

                (kind, ids)
            })
            .collect::<HashMap<_, _>>();

        let mut invoices = data
            .sales
            .iter()
            .map(|sale| sale.invoice_id.to_owned())
            .collect::<HashSet<_>>();

        for sale in sales.iter() {
            if !invoices.insert(sale.invoice_id.to_owned()) {
                return Err(StoreError::DuplicateInvoice(sale.invoice_id.to_owned()));
            }

            for kind in DimensionKind::ALL {
                let id = sale.reference(kind);

                if !references[&kind].contains(&id) {
                    return Err(StoreError::MissingDimension {
                        table: kind.table(),
                        key: id.to_string(),
                    });
                }
            }
        }

        let start_at = data.sales.len();

        for (offset, sale) in sales.iter().enumerate() {
            let id = i32::try_from(start_at + offset + 1).map_err(|_| StoreError::Constraint {
                table: Table::Sales.name(),
                message: "surrogate key space exhausted".to_owned(),
            })?;

            data.sales.push(sale.to_sale(id, now));
        }

        Ok(sales.len() as u64)
    }

    async fn sales(&self) -> Result<Vec<Sale>> {
        Ok(self.0.read().sales.clone())
    }

    async fn summary(&self) -> Result<Vec<SalesSummary>> {
        let data = self.0.read();

        let find = |kind: DimensionKind, id: i32| {
            data.dimensions
                .get(&kind)
                .and_then(|rows| rows.iter().find(|row| row.id() == id))
        };

        let mut summary = Vec::with_capacity(data.sales.len());

        for sale in data.sales.iter() {
            let (
                Some(DimensionRow::Customer(customer)),
                Some(DimensionRow::Product(product)),
                Some(DimensionRow::Time(time)),
                Some(DimensionRow::Branch(branch)),
                Some(DimensionRow::Payment(payment)),
            ) = (
                find(DimensionKind::Customer, sale.customer_id),
                find(DimensionKind::Product, sale.product_id),
                find(DimensionKind::Time, sale.time_id),
                find(DimensionKind::Branch, sale.branch_id),
                find(DimensionKind::Payment, sale.payment_id),
            )
            else {
                continue;
            };

            summary.push(SalesSummary {
                sales_id: sale.sales_id,
                invoice_id: sale.invoice_id.to_owned(),
                customer_type: customer.customer_type.to_owned(),
                gender: customer.gender.to_owned(),
                product_line: product.product_line.to_owned(),
                unit_price: product.unit_price,
                date: time.date,
                time: time.time,
                year: time.year,
                month: time.month,
                quarter: time.quarter,
                weekday: time.weekday,
                is_weekend: time.is_weekend,
                branch: branch.branch.to_owned(),
                city: branch.city.to_owned(),
                payment_method: payment.payment_method.to_owned(),
                quantity: sale.quantity,
                tax_5_percent: sale.tax_5_percent,
                sales: sale.sales,
                cogs: sale.cogs,
                gross_margin_percentage: sale.gross_margin_percentage,
                gross_income: sale.gross_income,
                rating: sale.rating,
                created_at: sale.created_at,
            });
        }

        Ok(summary)
    }

    async fn count(&self, table: Table) -> Result<i64> {
        let data = self.0.read();

        let count = match table {
            Table::Dimension(kind) => data.dimensions.get(&kind).map_or(0, Vec::len),
            Table::Sales => data.sales.len(),
        };

        Ok(count as i64)
    }
}
