//! DDL of the supermarket sales star schema.
//!
//! Tables and indexes are described once with `sea-query` and rendered for
//! each supported backend. Every statement is idempotent so `migrate` can run
//! on an existing warehouse.

use sea_query::{
    ColumnDef, Expr, ForeignKey, ForeignKeyCreateStatement, Iden, Index, IndexCreateStatement,
    Table, TableCreateStatement,
};

use crate::error::{Result, StoreError};

#[derive(Iden, Clone, Copy)]
pub enum DimCustomer {
    Table,
    CustomerId,
    CustomerType,
    Gender,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum DimProduct {
    Table,
    ProductId,
    ProductLine,
    UnitPrice,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum DimTime {
    Table,
    TimeId,
    Date,
    Time,
    Year,
    Month,
    Day,
    Quarter,
    Weekday,
    IsWeekend,
    CreatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum DimBranch {
    Table,
    BranchId,
    Branch,
    City,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum DimPayment {
    Table,
    PaymentId,
    PaymentMethod,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden, Clone, Copy)]
pub enum FactSales {
    Table,
    SalesId,
    InvoiceId,
    CustomerId,
    ProductId,
    TimeId,
    BranchId,
    PaymentId,
    Quantity,
    #[iden = "tax_5_percent"]
    Tax5Percent,
    Sales,
    Cogs,
    GrossMarginPercentage,
    GrossIncome,
    Rating,
    CreatedAt,
    UpdatedAt,
}

pub const SALES_SUMMARY_VIEW: &str = "v_sales_summary";

const SALES_SUMMARY_SELECT: &str = r#"SELECT
    fs.sales_id,
    fs.invoice_id,
    dc.customer_type,
    dc.gender,
    dp.product_line,
    dp.unit_price,
    dt."date",
    dt."time",
    dt.year,
    dt.month,
    dt.quarter,
    dt.weekday,
    dt.is_weekend,
    db.branch,
    db.city,
    dpm.payment_method,
    fs.quantity,
    fs.tax_5_percent,
    fs.sales,
    fs.cogs,
    fs.gross_margin_percentage,
    fs.gross_income,
    fs.rating,
    fs.created_at
FROM fact_sales fs
JOIN dim_customer dc ON fs.customer_id = dc.customer_id
JOIN dim_product dp ON fs.product_id = dp.product_id
JOIN dim_time dt ON fs.time_id = dt.time_id
JOIN dim_branch db ON fs.branch_id = db.branch_id
JOIN dim_payment dpm ON fs.payment_id = dpm.payment_id"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Maps `sqlx::Database::NAME` to a dialect.
    pub fn from_name(name: &'static str) -> Result<Self> {
        match name {
            "SQLite" => Ok(Dialect::Sqlite),
            "PostgreSQL" => Ok(Dialect::Postgres),
            name => Err(StoreError::UnsupportedDatabase(name)),
        }
    }
}

enum Statement {
    Table(TableCreateStatement),
    Index(IndexCreateStatement),
}

impl Statement {
    fn render(&self, dialect: Dialect) -> Result<String> {
        match dialect {
            #[cfg(feature = "sqlite")]
            Dialect::Sqlite => Ok(match self {
                Statement::Table(statement) => statement.to_string(sea_query::SqliteQueryBuilder),
                Statement::Index(statement) => statement.to_string(sea_query::SqliteQueryBuilder),
            }),
            #[cfg(feature = "postgres")]
            Dialect::Postgres => Ok(match self {
                Statement::Table(statement) => statement.to_string(sea_query::PostgresQueryBuilder),
                Statement::Index(statement) => statement.to_string(sea_query::PostgresQueryBuilder),
            }),
            #[allow(unreachable_patterns)]
            Dialect::Sqlite => Err(StoreError::UnsupportedDatabase("SQLite")),
            #[allow(unreachable_patterns)]
            Dialect::Postgres => Err(StoreError::UnsupportedDatabase("PostgreSQL")),
        }
    }
}

fn id(column: impl Iden + 'static) -> ColumnDef {
    ColumnDef::new(column)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn label(column: impl Iden + 'static, len: u32) -> ColumnDef {
    ColumnDef::new(column).string_len(len).not_null().to_owned()
}

fn amount(column: impl Iden + 'static) -> ColumnDef {
    ColumnDef::new(column).double().not_null().to_owned()
}

fn timestamp(column: impl Iden + 'static) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

fn natural_key(
    name: &str,
    table: impl Iden + 'static,
    columns: Vec<sea_query::DynIden>,
) -> Statement {
    let mut index = Index::create()
        .if_not_exists()
        .name(name)
        .table(table)
        .unique()
        .to_owned();

    for column in columns {
        index.col(column);
    }

    Statement::Index(index)
}

fn fact_index(name: &str, column: FactSales) -> Statement {
    Statement::Index(
        Index::create()
            .if_not_exists()
            .name(name)
            .table(FactSales::Table)
            .col(column)
            .to_owned(),
    )
}

fn references(
    column: FactSales,
    table: impl Iden + 'static,
    key: impl Iden + 'static,
) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .from(FactSales::Table, column)
        .to(table, key)
        .to_owned()
}

fn statements() -> Vec<Statement> {
    use sea_query::IntoIden;

    let dim_customer = Table::create()
        .table(DimCustomer::Table)
        .if_not_exists()
        .col(&mut id(DimCustomer::CustomerId))
        .col(&mut label(DimCustomer::CustomerType, 50))
        .col(&mut label(DimCustomer::Gender, 10))
        .col(&mut timestamp(DimCustomer::CreatedAt))
        .col(&mut timestamp(DimCustomer::UpdatedAt))
        .to_owned();

    let dim_product = Table::create()
        .table(DimProduct::Table)
        .if_not_exists()
        .col(&mut id(DimProduct::ProductId))
        .col(&mut label(DimProduct::ProductLine, 100))
        .col(&mut amount(DimProduct::UnitPrice))
        .col(&mut timestamp(DimProduct::CreatedAt))
        .col(&mut timestamp(DimProduct::UpdatedAt))
        .to_owned();

    let dim_time = Table::create()
        .table(DimTime::Table)
        .if_not_exists()
        .col(&mut id(DimTime::TimeId))
        .col(ColumnDef::new(DimTime::Date).date().not_null())
        .col(ColumnDef::new(DimTime::Time).time().not_null())
        .col(ColumnDef::new(DimTime::Year).integer().not_null())
        .col(ColumnDef::new(DimTime::Month).integer().not_null())
        .col(ColumnDef::new(DimTime::Day).integer().not_null())
        .col(ColumnDef::new(DimTime::Quarter).integer().not_null())
        .col(ColumnDef::new(DimTime::Weekday).integer().not_null())
        .col(ColumnDef::new(DimTime::IsWeekend).boolean().not_null())
        .col(&mut timestamp(DimTime::CreatedAt))
        .to_owned();

    let dim_branch = Table::create()
        .table(DimBranch::Table)
        .if_not_exists()
        .col(&mut id(DimBranch::BranchId))
        .col(&mut label(DimBranch::Branch, 10))
        .col(&mut label(DimBranch::City, 50))
        .col(&mut timestamp(DimBranch::CreatedAt))
        .col(&mut timestamp(DimBranch::UpdatedAt))
        .to_owned();

    let dim_payment = Table::create()
        .table(DimPayment::Table)
        .if_not_exists()
        .col(&mut id(DimPayment::PaymentId))
        .col(&mut label(DimPayment::PaymentMethod, 50))
        .col(&mut timestamp(DimPayment::CreatedAt))
        .col(&mut timestamp(DimPayment::UpdatedAt))
        .to_owned();

    let fact_sales = Table::create()
        .table(FactSales::Table)
        .if_not_exists()
        .col(&mut id(FactSales::SalesId))
        .col(label(FactSales::InvoiceId, 20).unique_key())
        .col(ColumnDef::new(FactSales::CustomerId).integer().not_null())
        .col(ColumnDef::new(FactSales::ProductId).integer().not_null())
        .col(ColumnDef::new(FactSales::TimeId).integer().not_null())
        .col(ColumnDef::new(FactSales::BranchId).integer().not_null())
        .col(ColumnDef::new(FactSales::PaymentId).integer().not_null())
        .col(
            ColumnDef::new(FactSales::Quantity)
                .integer()
                .not_null()
                .check(Expr::col(FactSales::Quantity).gt(0)),
        )
        .col(&mut amount(FactSales::Tax5Percent))
        .col(&mut amount(FactSales::Sales))
        .col(&mut amount(FactSales::Cogs))
        .col(&mut amount(FactSales::GrossMarginPercentage))
        .col(&mut amount(FactSales::GrossIncome))
        .col(&mut amount(FactSales::Rating))
        .col(&mut timestamp(FactSales::CreatedAt))
        .col(&mut timestamp(FactSales::UpdatedAt))
        .foreign_key(&mut references(
            FactSales::CustomerId,
            DimCustomer::Table,
            DimCustomer::CustomerId,
        ))
        .foreign_key(&mut references(
            FactSales::ProductId,
            DimProduct::Table,
            DimProduct::ProductId,
        ))
        .foreign_key(&mut references(
            FactSales::TimeId,
            DimTime::Table,
            DimTime::TimeId,
        ))
        .foreign_key(&mut references(
            FactSales::BranchId,
            DimBranch::Table,
            DimBranch::BranchId,
        ))
        .foreign_key(&mut references(
            FactSales::PaymentId,
            DimPayment::Table,
            DimPayment::PaymentId,
        ))
        .to_owned();

    vec![
        Statement::Table(dim_customer),
        Statement::Table(dim_product),
        Statement::Table(dim_time),
        Statement::Table(dim_branch),
        Statement::Table(dim_payment),
        Statement::Table(fact_sales),
        natural_key(
            "ux_dim_customer_natural",
            DimCustomer::Table,
            vec![
                DimCustomer::CustomerType.into_iden(),
                DimCustomer::Gender.into_iden(),
            ],
        ),
        natural_key(
            "ux_dim_product_natural",
            DimProduct::Table,
            vec![
                DimProduct::ProductLine.into_iden(),
                DimProduct::UnitPrice.into_iden(),
            ],
        ),
        natural_key(
            "ux_dim_time_natural",
            DimTime::Table,
            vec![DimTime::Date.into_iden(), DimTime::Time.into_iden()],
        ),
        natural_key(
            "ux_dim_branch_natural",
            DimBranch::Table,
            vec![DimBranch::Branch.into_iden(), DimBranch::City.into_iden()],
        ),
        natural_key(
            "ux_dim_payment_natural",
            DimPayment::Table,
            vec![DimPayment::PaymentMethod.into_iden()],
        ),
        fact_index("idx_fact_sales_invoice_id", FactSales::InvoiceId),
        fact_index("idx_fact_sales_customer_id", FactSales::CustomerId),
        fact_index("idx_fact_sales_product_id", FactSales::ProductId),
        fact_index("idx_fact_sales_time_id", FactSales::TimeId),
        fact_index("idx_fact_sales_branch_id", FactSales::BranchId),
        fact_index("idx_fact_sales_payment_id", FactSales::PaymentId),
        fact_index("idx_fact_sales_created_at", FactSales::CreatedAt),
    ]
}

/// Every statement needed to bring an empty database to the current schema,
/// in execution order.
pub fn get_schema(dialect: Dialect) -> Result<Vec<String>> {
    let mut schema = statements()
        .iter()
        .map(|statement| statement.render(dialect))
        .collect::<Result<Vec<_>>>()?;

    schema.push(match dialect {
        Dialect::Sqlite => {
            format!("CREATE VIEW IF NOT EXISTS {SALES_SUMMARY_VIEW} AS {SALES_SUMMARY_SELECT}")
        }
        Dialect::Postgres => {
            format!("CREATE OR REPLACE VIEW {SALES_SUMMARY_VIEW} AS {SALES_SUMMARY_SELECT}")
        }
    });

    Ok(schema)
}
