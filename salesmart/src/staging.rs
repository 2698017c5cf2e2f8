use std::{
    collections::BTreeMap,
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use chrono::{NaiveDate, NaiveTime};
use glob_match::glob_match;
use salesmart_store::StagingRow;
use serde::{Deserialize, Serialize};

use crate::config::DataQualityConfig;

/// File picked first when present in the raw directory.
pub const DEFAULT_SOURCE: &str = "SuperMarketAnalysis.csv";

const DATE_FORMATS: [&str; 3] = ["%m/%d/%Y", "%Y-%m-%d", "%d.%m.%Y"];
const TIME_FORMATS: [&str; 4] = ["%I:%M:%S %p", "%I:%M %p", "%H:%M:%S", "%H:%M"];

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv `{0}`")]
    Csv(#[from] csv::Error),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("no csv file found in `{0}`")]
    NoCsv(PathBuf),
}

pub type Result<T> = std::result::Result<T, StagingError>;

/// One line of the supermarket export, before cleaning. Short lines leave the
/// trailing columns missing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRecord {
    #[serde(rename = "Invoice ID")]
    invoice_id: Option<String>,
    #[serde(rename = "Branch")]
    branch: Option<String>,
    #[serde(rename = "City")]
    city: Option<String>,
    #[serde(rename = "Customer type")]
    customer_type: Option<String>,
    #[serde(rename = "Gender")]
    gender: Option<String>,
    #[serde(rename = "Product line")]
    product_line: Option<String>,
    #[serde(rename = "Unit price")]
    unit_price: Option<String>,
    #[serde(rename = "Quantity")]
    quantity: Option<String>,
    #[serde(rename = "Tax 5%")]
    tax: Option<String>,
    #[serde(rename = "Sales")]
    sales: Option<String>,
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "Time")]
    time: Option<String>,
    #[serde(rename = "Payment")]
    payment: Option<String>,
    cogs: Option<String>,
    #[serde(rename = "gross margin percentage")]
    gross_margin_percentage: Option<String>,
    #[serde(rename = "gross income")]
    gross_income: Option<String>,
    #[serde(rename = "Rating")]
    rating: Option<String>,
}

impl RawRecord {
    fn clean(self) -> StagingRow {
        StagingRow {
            invoice_id: text(self.invoice_id),
            customer_type: text(self.customer_type),
            gender: text(self.gender),
            product_line: text(self.product_line),
            unit_price: number(self.unit_price),
            date: text(self.date).and_then(|value| parse_date(&value)),
            time: text(self.time).and_then(|value| parse_time(&value)),
            branch: text(self.branch),
            city: text(self.city),
            payment: text(self.payment),
            quantity: text(self.quantity).and_then(|value| parse_quantity(&value)),
            tax: number(self.tax),
            sales: number(self.sales),
            cogs: number(self.cogs),
            gross_margin_percentage: number(self.gross_margin_percentage),
            gross_income: number(self.gross_income),
            rating: number(self.rating),
        }
    }
}

fn text(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();

    (!value.is_empty()).then(|| value.to_owned())
}

fn number(value: Option<String>) -> Option<f64> {
    text(value)?
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn parse_quantity(value: &str) -> Option<i32> {
    if let Ok(quantity) = value.parse::<i32>() {
        return Some(quantity);
    }

    let quantity = value.parse::<f64>().ok()?;
    if quantity.fract() != 0.0 || quantity < i32::MIN as f64 || quantity > i32::MAX as f64 {
        return None;
    }

    Some(quantity as i32)
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
}

/// Reads and cleans the supermarket export at `path`.
pub fn read_csv(path: &Path, required_columns: &[String]) -> Result<Vec<StagingRow>> {
    let file = fs::File::open(path).map_err(|source| StagingError::Io {
        path: path.to_owned(),
        source,
    })?;

    let rows = read_csv_from(file, required_columns)?;

    tracing::info!(path = %path.display(), rows = rows.len(), "source extracted");

    Ok(rows)
}

/// Cleaning rules: strings are trimmed, blanks become missing values and
/// numbers, dates or times that fail to parse are treated as missing.
pub fn read_csv_from<R: Read>(reader: R, required_columns: &[String]) -> Result<Vec<StagingRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let missing = required_columns
        .iter()
        .filter(|column| !headers.iter().any(|header| header == column.as_str()))
        .cloned()
        .collect::<Vec<_>>();

    if !missing.is_empty() {
        return Err(StagingError::MissingColumns(missing));
    }

    let mut rows = vec![];
    for record in reader.deserialize::<RawRecord>() {
        rows.push(record?.clean());
    }

    Ok(rows)
}

/// Source file of the raw directory: `SuperMarketAnalysis.csv` when present,
/// otherwise the first `*.csv` by name.
pub fn find_csv(dir: &Path) -> Result<PathBuf> {
    let default = dir.join(DEFAULT_SOURCE);
    if default.is_file() {
        return Ok(default);
    }

    let entries = fs::read_dir(dir).map_err(|source| StagingError::Io {
        path: dir.to_owned(),
        source,
    })?;

    let mut files = vec![];
    for entry in entries {
        let entry = entry.map_err(|source| StagingError::Io {
            path: dir.to_owned(),
            source,
        })?;

        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| glob_match("*.csv", name));

        if matches && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    files
        .into_iter()
        .next()
        .ok_or_else(|| StagingError::NoCsv(dir.to_owned()))
}

/// Drops the rows with a missing value. Returns the kept rows and how many
/// were dropped.
pub fn drop_incomplete(rows: Vec<StagingRow>) -> (Vec<StagingRow>, usize) {
    let total = rows.len();
    let rows = rows
        .into_iter()
        .filter(StagingRow::is_complete)
        .collect::<Vec<_>>();

    let dropped = total - rows.len();
    if dropped > 0 {
        tracing::warn!(dropped, "incomplete staging rows dropped");
    }

    (rows, dropped)
}

/// Data-quality findings on a staging batch. Never fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    pub rows: usize,
    pub incomplete: usize,
    /// Missing values per staging field.
    pub missing: BTreeMap<&'static str, usize>,
    pub min_sales: Option<f64>,
    pub max_sales: Option<f64>,
    pub below_min_sales: usize,
    pub above_max_sales: usize,
}

impl QualityReport {
    pub fn check(rows: &[StagingRow], config: &DataQualityConfig) -> Self {
        let mut report = QualityReport {
            rows: rows.len(),
            ..Default::default()
        };

        for row in rows {
            let missing = row.missing_fields();
            if !missing.is_empty() {
                report.incomplete += 1;
            }

            for field in missing {
                *report.missing.entry(field).or_default() += 1;
            }

            let Some(sales) = row.sales else {
                continue;
            };

            report.min_sales = Some(report.min_sales.map_or(sales, |min| min.min(sales)));
            report.max_sales = Some(report.max_sales.map_or(sales, |max| max.max(sales)));

            if sales < config.min_sales_amount {
                report.below_min_sales += 1;
            }

            if sales > config.max_sales_amount {
                report.above_max_sales += 1;
            }
        }

        if !report.missing.is_empty() {
            tracing::warn!(missing = ?report.missing, "missing values found");
        }

        if report.below_min_sales > 0 {
            tracing::warn!(
                rows = report.below_min_sales,
                min_sales = ?report.min_sales,
                "sales amount below minimum"
            );
        }

        if report.above_max_sales > 0 {
            tracing::warn!(
                rows = report.above_max_sales,
                max_sales = ?report.max_sales,
                "sales amount above maximum"
            );
        }

        report
    }

    pub fn is_clean(&self) -> bool {
        self.incomplete == 0 && self.below_min_sales == 0 && self.above_max_sales == 0
    }
}
