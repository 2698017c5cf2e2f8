use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, StoreError},
    model::{DimensionKey, DimensionKind, NewSale, Price},
};

const FACT_TABLE: &str = "fact_sales";

/// One raw sale as delivered by the upstream loader.
///
/// Every attribute is optional: the staging relation carries whatever the
/// source file had, and each consumer decides which fields it requires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StagingRow {
    pub invoice_id: Option<String>,
    pub customer_type: Option<String>,
    pub gender: Option<String>,
    pub product_line: Option<String>,
    pub unit_price: Option<f64>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub branch: Option<String>,
    pub city: Option<String>,
    pub payment: Option<String>,
    pub quantity: Option<i32>,
    pub tax: Option<f64>,
    pub sales: Option<f64>,
    pub cogs: Option<f64>,
    pub gross_margin_percentage: Option<f64>,
    pub gross_income: Option<f64>,
    pub rating: Option<f64>,
}

impl StagingRow {
    /// Natural key of `kind` carried by this row. `row` is the position of
    /// the row in its batch and only serves error reporting.
    pub fn key(&self, kind: DimensionKind, row: usize) -> Result<DimensionKey> {
        let table = kind.table();

        let key = match kind {
            DimensionKind::Customer => DimensionKey::Customer {
                customer_type: required(&self.customer_type, table, row, "customer_type")?
                    .to_owned(),
                gender: required(&self.gender, table, row, "gender")?.to_owned(),
            },
            DimensionKind::Product => {
                let unit_price = *required(&self.unit_price, table, row, "unit_price")?;

                DimensionKey::Product {
                    product_line: required(&self.product_line, table, row, "product_line")?
                        .to_owned(),
                    unit_price: Price::new(unit_price).ok_or_else(|| {
                        StoreError::InvalidField {
                            table,
                            row,
                            field: "unit_price",
                            reason: format!("{unit_price} is not a finite number"),
                        }
                    })?,
                }
            }
            DimensionKind::Time => DimensionKey::Time {
                date: *required(&self.date, table, row, "date")?,
                time: *required(&self.time, table, row, "time")?,
            },
            DimensionKind::Branch => DimensionKey::Branch {
                branch: required(&self.branch, table, row, "branch")?.to_owned(),
                city: required(&self.city, table, row, "city")?.to_owned(),
            },
            DimensionKind::Payment => DimensionKey::Payment {
                payment_method: required(&self.payment, table, row, "payment")?.to_owned(),
            },
        };

        Ok(key)
    }

    /// Builds the fact row for this sale, resolving every dimension reference
    /// through `lookup`.
    pub fn to_new_sale(&self, row: usize, lookup: &KeyLookup) -> Result<NewSale> {
        let invoice_id = required(&self.invoice_id, FACT_TABLE, row, "invoice_id")?.to_owned();
        let quantity = *required(&self.quantity, FACT_TABLE, row, "quantity")?;

        if quantity <= 0 {
            return Err(StoreError::InvalidField {
                table: FACT_TABLE,
                row,
                field: "quantity",
                reason: format!("{quantity} is not positive"),
            });
        }

        let mut ids = [0; 5];
        for (slot, kind) in ids.iter_mut().zip(DimensionKind::ALL) {
            let key = self.key(kind, row)?;

            *slot = lookup
                .get(&key)
                .ok_or_else(|| StoreError::MissingDimension {
                    table: kind.table(),
                    key: key.to_string(),
                })?;
        }

        let [customer_id, product_id, time_id, branch_id, payment_id] = ids;

        Ok(NewSale {
            invoice_id,
            customer_id,
            product_id,
            time_id,
            branch_id,
            payment_id,
            quantity,
            tax_5_percent: *required(&self.tax, FACT_TABLE, row, "tax")?,
            sales: *required(&self.sales, FACT_TABLE, row, "sales")?,
            cogs: *required(&self.cogs, FACT_TABLE, row, "cogs")?,
            gross_margin_percentage: *required(
                &self.gross_margin_percentage,
                FACT_TABLE,
                row,
                "gross_margin_percentage",
            )?,
            gross_income: *required(&self.gross_income, FACT_TABLE, row, "gross_income")?,
            rating: *required(&self.rating, FACT_TABLE, row, "rating")?,
        })
    }

    /// Names of the attributes this row lacks.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let present = [
            ("invoice_id", self.invoice_id.is_some()),
            ("customer_type", self.customer_type.is_some()),
            ("gender", self.gender.is_some()),
            ("product_line", self.product_line.is_some()),
            ("unit_price", self.unit_price.is_some()),
            ("date", self.date.is_some()),
            ("time", self.time.is_some()),
            ("branch", self.branch.is_some()),
            ("city", self.city.is_some()),
            ("payment", self.payment.is_some()),
            ("quantity", self.quantity.is_some()),
            ("tax", self.tax.is_some()),
            ("sales", self.sales.is_some()),
            ("cogs", self.cogs.is_some()),
            ("gross_margin_percentage", self.gross_margin_percentage.is_some()),
            ("gross_income", self.gross_income.is_some()),
            ("rating", self.rating.is_some()),
        ];

        present
            .into_iter()
            .filter_map(|(field, present)| (!present).then_some(field))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Natural key to surrogate id, across all five dimensions.
#[derive(Debug, Clone, Default)]
pub struct KeyLookup(HashMap<DimensionKey, i32>);

impl KeyLookup {
    pub fn get(&self, key: &DimensionKey) -> Option<i32> {
        self.0.get(key).copied()
    }

    pub fn insert(&mut self, key: DimensionKey, id: i32) {
        self.0.insert(key, id);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn required<'a, T>(
    value: &'a Option<T>,
    table: &'static str,
    row: usize,
    field: &'static str,
) -> Result<&'a T> {
    value
        .as_ref()
        .ok_or(StoreError::MissingField { table, row, field })
}
