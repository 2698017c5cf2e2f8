use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use salesmart_store::{
    Branch, Customer, DimensionKind, DimensionRow, Payment, Product, SaleTime, SalesSummary,
    Warehouse,
};
use serde::Serialize;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BranchSales {
    pub branch: String,
    pub city: String,
    pub total_sales: f64,
    pub transaction_count: i64,
    pub avg_sales: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductSales {
    pub product_line: String,
    pub total_sales: f64,
    pub transaction_count: i64,
    pub avg_unit_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlySales {
    pub year: i32,
    pub month: i32,
    pub total_sales: f64,
    pub transaction_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomerAnalysis {
    pub customer_type: String,
    pub gender: String,
    pub total_sales: f64,
    pub transaction_count: i64,
    pub avg_rating: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryLine {
    pub customer_type: String,
    pub gender: String,
    pub product_line: String,
    pub branch: String,
    pub city: String,
    pub payment_method: String,
    pub transaction_count: i64,
    pub total_sales: f64,
    pub avg_rating: f64,
}

#[derive(Debug, Default)]
struct Totals {
    count: i64,
    sales: f64,
    unit_price: f64,
    rating: f64,
}

impl Totals {
    fn add(&mut self, row: &SalesSummary) {
        self.count += 1;
        self.sales += row.sales;
        self.unit_price += row.unit_price;
        self.rating += row.rating;
    }

    fn avg(&self, sum: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }

        sum / self.count as f64
    }
}

fn group<K: Ord>(rows: &[SalesSummary], key: impl Fn(&SalesSummary) -> K) -> BTreeMap<K, Totals> {
    let mut groups = BTreeMap::<K, Totals>::new();

    for row in rows {
        groups.entry(key(row)).or_default().add(row);
    }

    groups
}

fn by_total_desc<T>(items: &mut [T], total: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| total(b).total_cmp(&total(a)));
}

/// Aggregates over `v_sales_summary`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub by_branch: Vec<BranchSales>,
    pub by_product: Vec<ProductSales>,
    pub monthly: Vec<MonthlySales>,
    pub customers: Vec<CustomerAnalysis>,
    pub summary: Vec<SummaryLine>,
}

impl Report {
    pub async fn from_warehouse(warehouse: &Warehouse) -> Result<Self> {
        Ok(Self::build(&warehouse.summary().await?))
    }

    pub fn build(rows: &[SalesSummary]) -> Self {
        let mut by_branch = group(rows, |row| (row.branch.to_owned(), row.city.to_owned()))
            .into_iter()
            .map(|((branch, city), totals)| BranchSales {
                branch,
                city,
                total_sales: totals.sales,
                transaction_count: totals.count,
                avg_sales: totals.avg(totals.sales),
            })
            .collect::<Vec<_>>();
        by_total_desc(&mut by_branch, |item| item.total_sales);

        let mut by_product = group(rows, |row| row.product_line.to_owned())
            .into_iter()
            .map(|(product_line, totals)| ProductSales {
                product_line,
                total_sales: totals.sales,
                transaction_count: totals.count,
                avg_unit_price: totals.avg(totals.unit_price),
            })
            .collect::<Vec<_>>();
        by_total_desc(&mut by_product, |item| item.total_sales);

        let monthly = group(rows, |row| (row.year, row.month))
            .into_iter()
            .map(|((year, month), totals)| MonthlySales {
                year,
                month,
                total_sales: totals.sales,
                transaction_count: totals.count,
            })
            .collect::<Vec<_>>();

        let mut customers = group(rows, |row| {
            (row.customer_type.to_owned(), row.gender.to_owned())
        })
        .into_iter()
        .map(|((customer_type, gender), totals)| CustomerAnalysis {
            customer_type,
            gender,
            total_sales: totals.sales,
            transaction_count: totals.count,
            avg_rating: totals.avg(totals.rating),
        })
        .collect::<Vec<_>>();
        by_total_desc(&mut customers, |item| item.total_sales);

        let mut summary = group(rows, |row| {
            (
                row.customer_type.to_owned(),
                row.gender.to_owned(),
                row.product_line.to_owned(),
                row.branch.to_owned(),
                row.city.to_owned(),
                row.payment_method.to_owned(),
            )
        })
        .into_iter()
        .map(
            |((customer_type, gender, product_line, branch, city, payment_method), totals)| {
                SummaryLine {
                    customer_type,
                    gender,
                    product_line,
                    branch,
                    city,
                    payment_method,
                    transaction_count: totals.count,
                    total_sales: totals.sales,
                    avg_rating: totals.avg(totals.rating),
                }
            },
        )
        .collect::<Vec<_>>();
        by_total_desc(&mut summary, |item| item.total_sales);

        Self {
            by_branch,
            by_product,
            monthly,
            customers,
            summary,
        }
    }
}

/// Files written by [`export`] and the tables that could not be exported.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
}

impl ExportReport {
    fn record(&mut self, name: &str, result: Result<PathBuf>) {
        match result {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "table exported");
                self.written.push(path);
            }
            Err(err) => {
                tracing::error!(table = name, error = %err, "failed to export table");
                self.failed.push((name.to_owned(), err.to_string()));
            }
        }
    }
}

/// Writes the warehouse tables and the reports as CSV files into `dir`.
///
/// A table that fails to export is logged and skipped.
pub async fn export(warehouse: &Warehouse, dir: &Path) -> Result<ExportReport> {
    fs::create_dir_all(dir).map_err(|source| PipelineError::Io {
        path: dir.to_owned(),
        source,
    })?;

    let mut report = ExportReport::default();

    let name = "sales_summary";
    let summary = match warehouse.summary().await {
        Ok(rows) => {
            report.record(name, write_csv(dir, name, &rows));
            Some(rows)
        }
        Err(err) => {
            report.record(name, Err(err.into()));
            None
        }
    };

    write_tables(warehouse, dir, &mut report).await;

    if let Some(rows) = summary {
        let aggregates = Report::build(&rows);

        let name = "sales_by_branch";
        report.record(name, write_csv(dir, name, &aggregates.by_branch));
        let name = "sales_by_product";
        report.record(name, write_csv(dir, name, &aggregates.by_product));
        let name = "monthly_sales_trend";
        report.record(name, write_csv(dir, name, &aggregates.monthly));
        let name = "customer_analysis";
        report.record(name, write_csv(dir, name, &aggregates.customers));
    }

    tracing::info!(
        dir = %dir.display(),
        written = report.written.len(),
        failed = report.failed.len(),
        "export completed"
    );

    Ok(report)
}

/// Writes the five dimensions and `fact_sales` into `dir`, the snapshot a
/// load leaves in the processed directory.
pub async fn snapshot(warehouse: &Warehouse, dir: &Path) -> Result<ExportReport> {
    fs::create_dir_all(dir).map_err(|source| PipelineError::Io {
        path: dir.to_owned(),
        source,
    })?;

    let mut report = ExportReport::default();
    write_tables(warehouse, dir, &mut report).await;

    tracing::info!(
        dir = %dir.display(),
        written = report.written.len(),
        failed = report.failed.len(),
        "processed snapshot saved"
    );

    Ok(report)
}

async fn write_tables(warehouse: &Warehouse, dir: &Path, report: &mut ExportReport) {
    for kind in DimensionKind::ALL {
        let result = match warehouse.dimension(kind).await {
            Ok(rows) => write_dimension(dir, kind, &rows),
            Err(err) => Err(err.into()),
        };

        report.record(kind.table(), result);
    }

    let name = "fact_sales";
    let result = match warehouse.sales().await {
        Ok(rows) => write_csv(dir, name, &rows),
        Err(err) => Err(err.into()),
    };
    report.record(name, result);
}

fn write_csv<T: Serialize + Default>(dir: &Path, name: &str, rows: &[T]) -> Result<PathBuf> {
    let path = dir.join(format!("{name}.csv"));
    let mut writer = csv::Writer::from_path(&path)?;

    if rows.is_empty() {
        writer.write_record(&header::<T>()?)?;
    }

    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_owned(),
        source,
    })?;

    Ok(path)
}

fn write_dimension(dir: &Path, kind: DimensionKind, rows: &[DimensionRow]) -> Result<PathBuf> {
    let path = dir.join(format!("{}.csv", kind.table()));
    let mut writer = csv::Writer::from_path(&path)?;

    if rows.is_empty() {
        let header = match kind {
            DimensionKind::Customer => header::<Customer>()?,
            DimensionKind::Product => header::<Product>()?,
            DimensionKind::Time => header::<SaleTime>()?,
            DimensionKind::Branch => header::<Branch>()?,
            DimensionKind::Payment => header::<Payment>()?,
        };

        writer.write_record(&header)?;
    }

    for row in rows {
        match row {
            DimensionRow::Customer(row) => writer.serialize(row)?,
            DimensionRow::Product(row) => writer.serialize(row)?,
            DimensionRow::Time(row) => writer.serialize(row)?,
            DimensionRow::Branch(row) => writer.serialize(row)?,
            DimensionRow::Payment(row) => writer.serialize(row)?,
        }
    }

    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_owned(),
        source,
    })?;

    Ok(path)
}

/// Column names `T` serializes to, so an empty table still gets its header.
fn header<T: Serialize + Default>() -> Result<csv::StringRecord> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.serialize(T::default())?;

    let data = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;

    let mut reader = csv::Reader::from_reader(data.as_slice());

    Ok(reader.headers()?.clone())
}
