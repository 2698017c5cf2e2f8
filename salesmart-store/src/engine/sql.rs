use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{
    Alias, Asterisk, Expr, Func, InsertStatement, IntoColumnRef, IntoTableRef, OnConflict, Order,
    Query, SelectStatement, SimpleExpr,
};
use sea_query_binder::{SqlxBinder, SqlxValues};
use sqlx::{Database, Pool};

use crate::{
    engine::{check_keys, Engine},
    error::{Result, StoreError},
    model::{
        Branch, Customer, DimensionKey, DimensionKind, DimensionRow, NewSale, Payment, Product,
        Sale, SaleTime, SalesSummary, Table, TimeAttributes,
    },
    schema::{
        get_schema, DimBranch, DimCustomer, DimPayment, DimProduct, DimTime, Dialect, FactSales,
        SALES_SUMMARY_VIEW,
    },
};

const CHUNK_SIZE: usize = 100;

pub struct Sql<DB: Database>(Pool<DB>);

#[cfg(feature = "sqlite")]
pub type Sqlite = Sql<sqlx::Sqlite>;

#[cfg(feature = "postgres")]
pub type Postgres = Sql<sqlx::Postgres>;

impl<DB: Database> Sql<DB> {
    fn build_sqlx<S: SqlxBinder>(statement: S) -> Result<(String, SqlxValues)> {
        match DB::NAME {
            #[cfg(feature = "sqlite")]
            "SQLite" => Ok(statement.build_sqlx(sea_query::SqliteQueryBuilder)),
            #[cfg(feature = "postgres")]
            "PostgreSQL" => Ok(statement.build_sqlx(sea_query::PostgresQueryBuilder)),
            name => Err(StoreError::UnsupportedDatabase(name)),
        }
    }
}

#[async_trait]
impl<DB> Engine for Sql<DB>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: sqlx::Executor<'c, Database = DB>,
    for<'q> DB::Arguments<'q>: sqlx::IntoArguments<'q, DB>,
    SqlxValues: for<'q> sqlx::IntoArguments<'q, DB>,
    i32: for<'r> sqlx::Decode<'r, DB> + sqlx::Type<DB>,
    i64: for<'r> sqlx::Decode<'r, DB> + sqlx::Type<DB>,
    String: for<'r> sqlx::Decode<'r, DB> + sqlx::Type<DB>,
    usize: sqlx::ColumnIndex<DB::Row>,
    Customer: for<'r> sqlx::FromRow<'r, DB::Row>,
    Product: for<'r> sqlx::FromRow<'r, DB::Row>,
    SaleTime: for<'r> sqlx::FromRow<'r, DB::Row>,
    Branch: for<'r> sqlx::FromRow<'r, DB::Row>,
    Payment: for<'r> sqlx::FromRow<'r, DB::Row>,
    Sale: for<'r> sqlx::FromRow<'r, DB::Row>,
    SalesSummary: for<'r> sqlx::FromRow<'r, DB::Row>,
{
    async fn migrate(&self) -> Result<()> {
        let schema = get_schema(Dialect::from_name(DB::NAME)?)?;
        let mut tx = self.0.begin().await?;

        for statement in schema.iter() {
            sqlx::query::<DB>(statement).execute(&mut *tx).await?;
        }

        tx.commit().await?;

        tracing::debug!(database = DB::NAME, statements = schema.len(), "schema applied");

        Ok(())
    }

    async fn insert_missing(&self, kind: DimensionKind, keys: Vec<DimensionKey>) -> Result<u64> {
        check_keys(kind, &keys)?;

        if keys.is_empty() {
            return Ok(0);
        }

        let table = kind.table();
        let now = Utc::now();
        let mut inserted = 0;
        let mut tx = self.0.begin().await.map_err(|err| write_error(table, err))?;

        for chunk in keys.chunks(CHUNK_SIZE) {
            let mut statement = dimension_insert(kind);

            for key in chunk.iter().cloned() {
                statement.values_panic(dimension_values(key, now));
            }

            let (sql, values) = Self::build_sqlx(statement)?;

            // ON CONFLICT DO NOTHING only returns the rows actually written.
            let rows = sqlx::query_as_with::<DB, (i32,), _>(&sql, values)
                .fetch_all(&mut *tx)
                .await
                .map_err(|err| write_error(table, err))?;

            inserted += rows.len() as u64;
        }

        tx.commit().await.map_err(|err| write_error(table, err))?;

        Ok(inserted)
    }

    async fn dimension(&self, kind: DimensionKind) -> Result<Vec<DimensionRow>> {
        let rows = match kind {
            DimensionKind::Customer => {
                fetch_all::<DB, Customer>(
                    &self.0,
                    select_all(DimCustomer::Table, DimCustomer::CustomerId),
                )
                .await?
                .into_iter()
                .map(DimensionRow::Customer)
                .collect()
            }
            DimensionKind::Product => {
                fetch_all::<DB, Product>(
                    &self.0,
                    select_all(DimProduct::Table, DimProduct::ProductId),
                )
                .await?
                .into_iter()
                .map(DimensionRow::Product)
                .collect()
            }
            DimensionKind::Time => {
                fetch_all::<DB, SaleTime>(&self.0, select_all(DimTime::Table, DimTime::TimeId))
                    .await?
                    .into_iter()
                    .map(DimensionRow::Time)
                    .collect()
            }
            DimensionKind::Branch => {
                fetch_all::<DB, Branch>(&self.0, select_all(DimBranch::Table, DimBranch::BranchId))
                    .await?
                    .into_iter()
                    .map(DimensionRow::Branch)
                    .collect()
            }
            DimensionKind::Payment => {
                fetch_all::<DB, Payment>(
                    &self.0,
                    select_all(DimPayment::Table, DimPayment::PaymentId),
                )
                .await?
                .into_iter()
                .map(DimensionRow::Payment)
                .collect()
            }
        };

        Ok(rows)
    }

    async fn existing_invoices(&self, invoice_ids: Vec<String>) -> Result<Vec<String>> {
        let mut existing = vec![];

        for chunk in invoice_ids.chunks(CHUNK_SIZE) {
            let (sql, values) = Self::build_sqlx(invoices_in(chunk))?;

            let rows = sqlx::query_as_with::<DB, (String,), _>(&sql, values)
                .fetch_all(&self.0)
                .await?;

            existing.extend(rows.into_iter().map(|(id,)| id));
        }

        Ok(existing)
    }

    async fn insert_sales(&self, sales: Vec<NewSale>) -> Result<u64> {
        if sales.is_empty() {
            return Ok(0);
        }

        let table = Table::Sales.name();
        let now = Utc::now();
        let mut inserted = 0;
        let mut tx = self.0.begin().await.map_err(|err| write_error(table, err))?;

        for chunk in sales.chunks(CHUNK_SIZE) {
            let invoice_ids = chunk
                .iter()
                .map(|sale| sale.invoice_id.to_owned())
                .collect::<Vec<_>>();

            let (sql, values) = Self::build_sqlx(invoices_in(&invoice_ids))?;

            if let Some((id,)) = sqlx::query_as_with::<DB, (String,), _>(&sql, values)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|err| write_error(table, err))?
            {
                return Err(StoreError::DuplicateInvoice(id));
            }

            let mut statement = Query::insert()
                .into_table(FactSales::Table)
                .columns([
                    FactSales::InvoiceId,
                    FactSales::CustomerId,
                    FactSales::ProductId,
                    FactSales::TimeId,
                    FactSales::BranchId,
                    FactSales::PaymentId,
                    FactSales::Quantity,
                    FactSales::Tax5Percent,
                    FactSales::Sales,
                    FactSales::Cogs,
                    FactSales::GrossMarginPercentage,
                    FactSales::GrossIncome,
                    FactSales::Rating,
                    FactSales::CreatedAt,
                    FactSales::UpdatedAt,
                ])
                .returning_col(FactSales::SalesId)
                .to_owned();

            for sale in chunk {
                statement.values_panic([
                    sale.invoice_id.to_owned().into(),
                    sale.customer_id.into(),
                    sale.product_id.into(),
                    sale.time_id.into(),
                    sale.branch_id.into(),
                    sale.payment_id.into(),
                    sale.quantity.into(),
                    sale.tax_5_percent.into(),
                    sale.sales.into(),
                    sale.cogs.into(),
                    sale.gross_margin_percentage.into(),
                    sale.gross_income.into(),
                    sale.rating.into(),
                    now.into(),
                    now.into(),
                ]);
            }

            let (sql, values) = Self::build_sqlx(statement)?;

            let rows = sqlx::query_as_with::<DB, (i32,), _>(&sql, values)
                .fetch_all(&mut *tx)
                .await
                .map_err(|err| write_error(table, err))?;

            inserted += rows.len() as u64;
        }

        tx.commit().await.map_err(|err| write_error(table, err))?;

        Ok(inserted)
    }

    async fn sales(&self) -> Result<Vec<Sale>> {
        fetch_all::<DB, Sale>(&self.0, select_all(FactSales::Table, FactSales::SalesId)).await
    }

    async fn summary(&self) -> Result<Vec<SalesSummary>> {
        fetch_all::<DB, SalesSummary>(
            &self.0,
            select_all(Alias::new(SALES_SUMMARY_VIEW), FactSales::SalesId),
        )
        .await
    }

    async fn count(&self, table: Table) -> Result<i64> {
        let statement = Query::select()
            .expr(Func::count(Expr::col(Asterisk)))
            .from(Alias::new(table.name()))
            .to_owned();

        let (sql, values) = Self::build_sqlx(statement)?;

        let (count,) = sqlx::query_as_with::<DB, (i64,), _>(&sql, values)
            .fetch_one(&self.0)
            .await?;

        Ok(count)
    }
}

impl<D: Database> Clone for Sql<D> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<D: Database> From<Pool<D>> for Sql<D> {
    fn from(value: Pool<D>) -> Self {
        Self(value)
    }
}

async fn fetch_all<DB, O>(pool: &Pool<DB>, statement: SelectStatement) -> Result<Vec<O>>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: sqlx::Executor<'c, Database = DB>,
    SqlxValues: for<'q> sqlx::IntoArguments<'q, DB>,
    O: for<'r> sqlx::FromRow<'r, DB::Row> + Send + Unpin,
{
    let (sql, values) = Sql::<DB>::build_sqlx(statement)?;

    Ok(sqlx::query_as_with::<DB, O, _>(&sql, values)
        .fetch_all(pool)
        .await?)
}

fn select_all(table: impl IntoTableRef, order: impl IntoColumnRef) -> SelectStatement {
    Query::select()
        .column(Asterisk)
        .from(table)
        .order_by(order, Order::Asc)
        .to_owned()
}

fn invoices_in(invoice_ids: &[String]) -> SelectStatement {
    Query::select()
        .column(FactSales::InvoiceId)
        .from(FactSales::Table)
        .and_where(Expr::col(FactSales::InvoiceId).is_in(invoice_ids.iter().cloned()))
        .to_owned()
}

fn dimension_insert(kind: DimensionKind) -> InsertStatement {
    match kind {
        DimensionKind::Customer => Query::insert()
            .into_table(DimCustomer::Table)
            .columns([
                DimCustomer::CustomerType,
                DimCustomer::Gender,
                DimCustomer::CreatedAt,
                DimCustomer::UpdatedAt,
            ])
            .on_conflict(
                OnConflict::columns([DimCustomer::CustomerType, DimCustomer::Gender])
                    .do_nothing()
                    .to_owned(),
            )
            .returning_col(DimCustomer::CustomerId)
            .to_owned(),
        DimensionKind::Product => Query::insert()
            .into_table(DimProduct::Table)
            .columns([
                DimProduct::ProductLine,
                DimProduct::UnitPrice,
                DimProduct::CreatedAt,
                DimProduct::UpdatedAt,
            ])
            .on_conflict(
                OnConflict::columns([DimProduct::ProductLine, DimProduct::UnitPrice])
                    .do_nothing()
                    .to_owned(),
            )
            .returning_col(DimProduct::ProductId)
            .to_owned(),
        DimensionKind::Time => Query::insert()
            .into_table(DimTime::Table)
            .columns([
                DimTime::Date,
                DimTime::Time,
                DimTime::Year,
                DimTime::Month,
                DimTime::Day,
                DimTime::Quarter,
                DimTime::Weekday,
                DimTime::IsWeekend,
                DimTime::CreatedAt,
            ])
            .on_conflict(
                OnConflict::columns([DimTime::Date, DimTime::Time])
                    .do_nothing()
                    .to_owned(),
            )
            .returning_col(DimTime::TimeId)
            .to_owned(),
        DimensionKind::Branch => Query::insert()
            .into_table(DimBranch::Table)
            .columns([
                DimBranch::Branch,
                DimBranch::City,
                DimBranch::CreatedAt,
                DimBranch::UpdatedAt,
            ])
            .on_conflict(
                OnConflict::columns([DimBranch::Branch, DimBranch::City])
                    .do_nothing()
                    .to_owned(),
            )
            .returning_col(DimBranch::BranchId)
            .to_owned(),
        DimensionKind::Payment => Query::insert()
            .into_table(DimPayment::Table)
            .columns([
                DimPayment::PaymentMethod,
                DimPayment::CreatedAt,
                DimPayment::UpdatedAt,
            ])
            .on_conflict(
                OnConflict::column(DimPayment::PaymentMethod)
                    .do_nothing()
                    .to_owned(),
            )
            .returning_col(DimPayment::PaymentId)
            .to_owned(),
    }
}

fn dimension_values(key: DimensionKey, now: DateTime<Utc>) -> Vec<SimpleExpr> {
    match key {
        DimensionKey::Customer {
            customer_type,
            gender,
        } => vec![customer_type.into(), gender.into(), now.into(), now.into()],
        DimensionKey::Product {
            product_line,
            unit_price,
        } => vec![
            product_line.into(),
            unit_price.value().into(),
            now.into(),
            now.into(),
        ],
        DimensionKey::Time { date, time } => {
            let attributes = TimeAttributes::from_date(date);

            vec![
                date.into(),
                time.into(),
                attributes.year.into(),
                attributes.month.into(),
                attributes.day.into(),
                attributes.quarter.into(),
                attributes.weekday.into(),
                attributes.is_weekend.into(),
                now.into(),
            ]
        }
        DimensionKey::Branch { branch, city } => {
            vec![branch.into(), city.into(), now.into(), now.into()]
        }
        DimensionKey::Payment { payment_method } => {
            vec![payment_method.into(), now.into(), now.into()]
        }
    }
}

fn write_error(table: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(ref db)
            if db.is_unique_violation()
                || db.is_foreign_key_violation()
                || db.is_check_violation() =>
        {
            StoreError::Constraint {
                table,
                message: db.message().to_owned(),
            }
        }
        source => StoreError::Write { table, source },
    }
}
