use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

/// The five lookup tables of the star schema.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    FromStr,
    Serialize,
    Deserialize,
)]
#[display(style = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    Customer,
    Product,
    Time,
    Branch,
    Payment,
}

impl DimensionKind {
    pub const ALL: [DimensionKind; 5] = [
        DimensionKind::Customer,
        DimensionKind::Product,
        DimensionKind::Time,
        DimensionKind::Branch,
        DimensionKind::Payment,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            DimensionKind::Customer => "dim_customer",
            DimensionKind::Product => "dim_product",
            DimensionKind::Time => "dim_time",
            DimensionKind::Branch => "dim_branch",
            DimensionKind::Payment => "dim_payment",
        }
    }
}

/// Every persisted table, used for row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Dimension(DimensionKind),
    Sales,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Dimension(DimensionKind::Customer),
        Table::Dimension(DimensionKind::Product),
        Table::Dimension(DimensionKind::Time),
        Table::Dimension(DimensionKind::Branch),
        Table::Dimension(DimensionKind::Payment),
        Table::Sales,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Dimension(kind) => kind.table(),
            Table::Sales => "fact_sales",
        }
    }
}

/// Unit price as part of a natural key.
///
/// Equality, ordering and hashing follow the bit pattern of the value, which
/// is what an exact-match anti-join on a numeric column does. `-0.0` is folded
/// into `0.0` and non-finite values are refused.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }

        Some(Self(if value == 0.0 { 0.0 } else { value }))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Price {}

impl Hash for Price {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Natural (deduplication) key of a dimension row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "dimension", rename_all = "snake_case")]
pub enum DimensionKey {
    Customer {
        customer_type: String,
        gender: String,
    },
    Product {
        product_line: String,
        unit_price: Price,
    },
    Time {
        date: NaiveDate,
        time: NaiveTime,
    },
    Branch {
        branch: String,
        city: String,
    },
    Payment {
        payment_method: String,
    },
}

impl DimensionKey {
    pub fn kind(&self) -> DimensionKind {
        match self {
            DimensionKey::Customer { .. } => DimensionKind::Customer,
            DimensionKey::Product { .. } => DimensionKind::Product,
            DimensionKey::Time { .. } => DimensionKind::Time,
            DimensionKey::Branch { .. } => DimensionKind::Branch,
            DimensionKey::Payment { .. } => DimensionKind::Payment,
        }
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionKey::Customer {
                customer_type,
                gender,
            } => write!(f, "({customer_type}, {gender})"),
            DimensionKey::Product {
                product_line,
                unit_price,
            } => write!(f, "({product_line}, {unit_price})"),
            DimensionKey::Time { date, time } => write!(f, "({date}, {time})"),
            DimensionKey::Branch { branch, city } => write!(f, "({branch}, {city})"),
            DimensionKey::Payment { payment_method } => write!(f, "({payment_method})"),
        }
    }
}

/// Calendar attributes derived from the date of a `dim_time` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAttributes {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub quarter: i32,
    /// Monday = 0 ... Sunday = 6
    pub weekday: i32,
    pub is_weekend: bool,
}

impl TimeAttributes {
    pub fn from_date(date: NaiveDate) -> Self {
        let month = date.month() as i32;
        let weekday = date.weekday();

        Self {
            year: date.year(),
            month,
            day: date.day() as i32,
            quarter: (month - 1) / 3 + 1,
            weekday: weekday.num_days_from_monday() as i32,
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sql", derive(sqlx::FromRow))]
pub struct Customer {
    pub customer_id: i32,
    pub customer_type: String,
    pub gender: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sql", derive(sqlx::FromRow))]
pub struct Product {
    pub product_id: i32,
    pub product_line: String,
    pub unit_price: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sql", derive(sqlx::FromRow))]
pub struct SaleTime {
    pub time_id: i32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub quarter: i32,
    pub weekday: i32,
    pub is_weekend: bool,
    pub created_at: DateTime<Utc>,
}

impl SaleTime {
    pub fn attributes(&self) -> TimeAttributes {
        TimeAttributes {
            year: self.year,
            month: self.month,
            day: self.day,
            quarter: self.quarter,
            weekday: self.weekday,
            is_weekend: self.is_weekend,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sql", derive(sqlx::FromRow))]
pub struct Branch {
    pub branch_id: i32,
    pub branch: String,
    pub city: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sql", derive(sqlx::FromRow))]
pub struct Payment {
    pub payment_id: i32,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored row of any dimension table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dimension", rename_all = "snake_case")]
pub enum DimensionRow {
    Customer(Customer),
    Product(Product),
    Time(SaleTime),
    Branch(Branch),
    Payment(Payment),
}

impl DimensionRow {
    /// Builds the row a dimension gets the first time `key` is observed,
    /// deriving the computed attributes of `dim_time`.
    pub fn new(id: i32, key: DimensionKey, now: DateTime<Utc>) -> Self {
        match key {
            DimensionKey::Customer {
                customer_type,
                gender,
            } => DimensionRow::Customer(Customer {
                customer_id: id,
                customer_type,
                gender,
                created_at: now,
                updated_at: now,
            }),
            DimensionKey::Product {
                product_line,
                unit_price,
            } => DimensionRow::Product(Product {
                product_id: id,
                product_line,
                unit_price: unit_price.value(),
                created_at: now,
                updated_at: now,
            }),
            DimensionKey::Time { date, time } => {
                let attributes = TimeAttributes::from_date(date);

                DimensionRow::Time(SaleTime {
                    time_id: id,
                    date,
                    time,
                    year: attributes.year,
                    month: attributes.month,
                    day: attributes.day,
                    quarter: attributes.quarter,
                    weekday: attributes.weekday,
                    is_weekend: attributes.is_weekend,
                    created_at: now,
                })
            }
            DimensionKey::Branch { branch, city } => DimensionRow::Branch(Branch {
                branch_id: id,
                branch,
                city,
                created_at: now,
                updated_at: now,
            }),
            DimensionKey::Payment { payment_method } => DimensionRow::Payment(Payment {
                payment_id: id,
                payment_method,
                created_at: now,
                updated_at: now,
            }),
        }
    }

    pub fn kind(&self) -> DimensionKind {
        match self {
            DimensionRow::Customer(_) => DimensionKind::Customer,
            DimensionRow::Product(_) => DimensionKind::Product,
            DimensionRow::Time(_) => DimensionKind::Time,
            DimensionRow::Branch(_) => DimensionKind::Branch,
            DimensionRow::Payment(_) => DimensionKind::Payment,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            DimensionRow::Customer(row) => row.customer_id,
            DimensionRow::Product(row) => row.product_id,
            DimensionRow::Time(row) => row.time_id,
            DimensionRow::Branch(row) => row.branch_id,
            DimensionRow::Payment(row) => row.payment_id,
        }
    }

    pub fn key(&self) -> DimensionKey {
        match self {
            DimensionRow::Customer(row) => DimensionKey::Customer {
                customer_type: row.customer_type.to_owned(),
                gender: row.gender.to_owned(),
            },
            DimensionRow::Product(row) => DimensionKey::Product {
                product_line: row.product_line.to_owned(),
                unit_price: Price(row.unit_price),
            },
            DimensionRow::Time(row) => DimensionKey::Time {
                date: row.date,
                time: row.time,
            },
            DimensionRow::Branch(row) => DimensionKey::Branch {
                branch: row.branch.to_owned(),
                city: row.city.to_owned(),
            },
            DimensionRow::Payment(row) => DimensionKey::Payment {
                payment_method: row.payment_method.to_owned(),
            },
        }
    }
}

/// A fact row with its dimension references already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSale {
    pub invoice_id: String,
    pub customer_id: i32,
    pub product_id: i32,
    pub time_id: i32,
    pub branch_id: i32,
    pub payment_id: i32,
    pub quantity: i32,
    pub tax_5_percent: f64,
    pub sales: f64,
    pub cogs: f64,
    pub gross_margin_percentage: f64,
    pub gross_income: f64,
    pub rating: f64,
}

impl NewSale {
    pub fn to_sale(&self, sales_id: i32, now: DateTime<Utc>) -> Sale {
        Sale {
            sales_id,
            invoice_id: self.invoice_id.to_owned(),
            customer_id: self.customer_id,
            product_id: self.product_id,
            time_id: self.time_id,
            branch_id: self.branch_id,
            payment_id: self.payment_id,
            quantity: self.quantity,
            tax_5_percent: self.tax_5_percent,
            sales: self.sales,
            cogs: self.cogs,
            gross_margin_percentage: self.gross_margin_percentage,
            gross_income: self.gross_income,
            rating: self.rating,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn reference(&self, kind: DimensionKind) -> i32 {
        match kind {
            DimensionKind::Customer => self.customer_id,
            DimensionKind::Product => self.product_id,
            DimensionKind::Time => self.time_id,
            DimensionKind::Branch => self.branch_id,
            DimensionKind::Payment => self.payment_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sql", derive(sqlx::FromRow))]
pub struct Sale {
    pub sales_id: i32,
    pub invoice_id: String,
    pub customer_id: i32,
    pub product_id: i32,
    pub time_id: i32,
    pub branch_id: i32,
    pub payment_id: i32,
    pub quantity: i32,
    pub tax_5_percent: f64,
    pub sales: f64,
    pub cogs: f64,
    pub gross_margin_percentage: f64,
    pub gross_income: f64,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the `v_sales_summary` reporting view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sql", derive(sqlx::FromRow))]
pub struct SalesSummary {
    pub sales_id: i32,
    pub invoice_id: String,
    pub customer_type: String,
    pub gender: String,
    pub product_line: String,
    pub unit_price: f64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub year: i32,
    pub month: i32,
    pub quarter: i32,
    pub weekday: i32,
    pub is_weekend: bool,
    pub branch: String,
    pub city: String,
    pub payment_method: String,
    pub quantity: i32,
    pub tax_5_percent: f64,
    pub sales: f64,
    pub cogs: f64,
    pub gross_margin_percentage: f64,
    pub gross_income: f64,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn saturday_is_weekend_in_first_quarter() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let attributes = TimeAttributes::from_date(date);

        assert_eq!(attributes.year, 2024);
        assert_eq!(attributes.month, 3);
        assert_eq!(attributes.day, 9);
        assert_eq!(attributes.quarter, 1);
        assert_eq!(attributes.weekday, 5);
        assert!(attributes.is_weekend);
    }

    #[test]
    fn quarters_and_weekdays() {
        let monday = NaiveDate::from_ymd_opt(2019, 1, 7).unwrap();
        let attributes = TimeAttributes::from_date(monday);
        assert_eq!(attributes.weekday, 0);
        assert!(!attributes.is_weekend);
        assert_eq!(attributes.quarter, 1);

        let sunday = NaiveDate::from_ymd_opt(2019, 12, 29).unwrap();
        let attributes = TimeAttributes::from_date(sunday);
        assert_eq!(attributes.weekday, 6);
        assert!(attributes.is_weekend);
        assert_eq!(attributes.quarter, 4);

        let july = NaiveDate::from_ymd_opt(2019, 7, 1).unwrap();
        assert_eq!(TimeAttributes::from_date(july).quarter, 3);
    }

    #[test]
    fn price_key_identity() {
        assert_eq!(Price::new(0.0), Price::new(-0.0));
        assert!(Price::new(f64::NAN).is_none());
        assert!(Price::new(f64::INFINITY).is_none());

        let keys: HashSet<DimensionKey> = [74.69, 74.69, 15.28]
            .into_iter()
            .map(|price| DimensionKey::Product {
                product_line: "Health and beauty".to_owned(),
                unit_price: Price::new(price).unwrap(),
            })
            .collect();

        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn row_round_trips_its_key() {
        let key = DimensionKey::Time {
            date: NaiveDate::from_ymd_opt(2019, 3, 8).unwrap(),
            time: NaiveTime::from_hms_opt(10, 29, 0).unwrap(),
        };
        let row = DimensionRow::new(3, key.clone(), Utc::now());

        assert_eq!(row.id(), 3);
        assert_eq!(row.kind(), DimensionKind::Time);
        assert_eq!(row.key(), key);
    }

    #[test]
    fn kind_names() {
        assert_eq!(DimensionKind::Payment.to_string(), "payment");
        assert_eq!("branch".parse::<DimensionKind>().unwrap(), DimensionKind::Branch);
        assert_eq!(DimensionKind::Time.table(), "dim_time");
        assert_eq!(Table::Sales.name(), "fact_sales");
    }
}
