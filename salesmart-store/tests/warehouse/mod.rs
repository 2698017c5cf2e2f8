use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use futures_util::future::join_all;
use salesmart_store::{
    DimensionKey, DimensionKind, DimensionRow, Engine, NewSale, StagingRow, StoreError, Table,
    Warehouse,
};

#[allow(clippy::too_many_arguments)]
pub fn staging(
    invoice_id: &str,
    customer: (&str, &str),
    product: (&str, f64),
    at: (i32, u32, u32, u32, u32),
    branch: (&str, &str),
    payment: &str,
    quantity: i32,
) -> StagingRow {
    let (year, month, day, hour, min) = at;
    let sales = product.1 * quantity as f64 * 1.05;

    StagingRow {
        invoice_id: Some(invoice_id.to_owned()),
        customer_type: Some(customer.0.to_owned()),
        gender: Some(customer.1.to_owned()),
        product_line: Some(product.0.to_owned()),
        unit_price: Some(product.1),
        date: NaiveDate::from_ymd_opt(year, month, day),
        time: NaiveTime::from_hms_opt(hour, min, 0),
        branch: Some(branch.0.to_owned()),
        city: Some(branch.1.to_owned()),
        payment: Some(payment.to_owned()),
        quantity: Some(quantity),
        tax: Some(sales - sales / 1.05),
        sales: Some(sales),
        cogs: Some(sales / 1.05),
        gross_margin_percentage: Some(4.761904762),
        gross_income: Some(sales - sales / 1.05),
        rating: Some(7.5),
    }
}

pub fn batch() -> Vec<StagingRow> {
    vec![
        staging(
            "750-67-8428",
            ("Member", "Female"),
            ("Health and beauty", 74.69),
            (2019, 1, 5, 13, 8),
            ("A", "Yangon"),
            "Ewallet",
            7,
        ),
        staging(
            "226-31-3081",
            ("Normal", "Female"),
            ("Electronic accessories", 15.28),
            (2019, 3, 8, 10, 29),
            ("C", "Naypyitaw"),
            "Cash",
            5,
        ),
        staging(
            "631-41-3108",
            ("Normal", "Male"),
            ("Home and lifestyle", 46.33),
            (2019, 3, 3, 13, 23),
            ("A", "Yangon"),
            "Credit card",
            7,
        ),
        staging(
            "123-19-1176",
            ("Member", "Male"),
            ("Health and beauty", 58.22),
            (2019, 1, 27, 20, 33),
            ("A", "Yangon"),
            "Ewallet",
            8,
        ),
        staging(
            "373-73-7910",
            ("Normal", "Male"),
            ("Sports and travel", 86.31),
            (2019, 2, 8, 10, 37),
            ("A", "Yangon"),
            "Ewallet",
            7,
        ),
        staging(
            "699-14-3026",
            ("Normal", "Male"),
            ("Electronic accessories", 85.39),
            (2019, 3, 25, 18, 30),
            ("C", "Naypyitaw"),
            "Ewallet",
            7,
        ),
    ]
}

async fn keys(warehouse: &Warehouse, kind: DimensionKind) -> anyhow::Result<Vec<String>> {
    let mut keys = warehouse
        .dimension(kind)
        .await?
        .into_iter()
        .map(|row| row.key().to_string())
        .collect::<Vec<_>>();

    keys.sort();

    Ok(keys)
}

pub async fn test_synchronize(warehouse: &Warehouse) -> anyhow::Result<()> {
    let rows = batch();
    let report = warehouse.synchronize(&rows).await?;

    assert_eq!(report.get(DimensionKind::Customer), 4);
    assert_eq!(report.get(DimensionKind::Product), 6);
    assert_eq!(report.get(DimensionKind::Time), 6);
    assert_eq!(report.get(DimensionKind::Branch), 2);
    assert_eq!(report.get(DimensionKind::Payment), 3);
    assert_eq!(report.total(), 21);

    for kind in DimensionKind::ALL {
        let expected = rows
            .iter()
            .map(|row| row.key(kind, 0).map(|key| key.to_string()))
            .collect::<Result<HashSet<_>, _>>()?;

        let stored = keys(warehouse, kind).await?;

        assert_eq!(stored.len(), expected.len(), "{kind}");
        assert_eq!(stored.into_iter().collect::<HashSet<_>>(), expected);
    }

    Ok(())
}

pub async fn test_idempotence(warehouse: &Warehouse) -> anyhow::Result<()> {
    let rows = batch();
    warehouse.synchronize(&rows).await?;

    let mut before = vec![];
    for kind in DimensionKind::ALL {
        before.push(warehouse.dimension(kind).await?);
    }

    let report = warehouse.synchronize(&rows).await?;
    assert_eq!(report.total(), 0);

    for (kind, before) in DimensionKind::ALL.into_iter().zip(before) {
        assert_eq!(warehouse.dimension(kind).await?, before);
    }

    Ok(())
}

pub async fn test_customer_pair(warehouse: &Warehouse) -> anyhow::Result<()> {
    let rows = vec![
        staging(
            "101-00-0001",
            ("Member", "Female"),
            ("Food and beverages", 10.0),
            (2019, 2, 1, 9, 0),
            ("B", "Mandalay"),
            "Cash",
            1,
        ),
        staging(
            "101-00-0002",
            ("Member", "Female"),
            ("Fashion accessories", 20.0),
            (2019, 2, 2, 9, 30),
            ("B", "Mandalay"),
            "Cash",
            2,
        ),
    ];

    let report = warehouse.synchronize(&rows).await?;
    assert_eq!(report.get(DimensionKind::Customer), 1);

    let customers = warehouse.dimension(DimensionKind::Customer).await?;
    assert_eq!(customers.len(), 1);

    let DimensionRow::Customer(customer) = &customers[0] else {
        panic!("expected a dim_customer row");
    };

    assert_eq!(customer.customer_type, "Member");
    assert_eq!(customer.gender, "Female");

    Ok(())
}

pub async fn test_existing_branch_unchanged(warehouse: &Warehouse) -> anyhow::Result<()> {
    let rows = batch();
    warehouse.synchronize(&rows[..1]).await?;

    let before = warehouse.dimension(DimensionKind::Branch).await?;
    assert_eq!(before.len(), 1);

    let report = warehouse.synchronize(&rows).await?;
    assert_eq!(report.get(DimensionKind::Branch), 1);

    let after = warehouse.dimension(DimensionKind::Branch).await?;
    assert_eq!(after.len(), 2);

    let yangon = after
        .iter()
        .find(|row| row.id() == before[0].id())
        .expect("branch A is still stored");

    assert_eq!(yangon, &before[0]);

    Ok(())
}

pub async fn test_time_attributes(warehouse: &Warehouse) -> anyhow::Result<()> {
    let rows = vec![staging(
        "202-00-0001",
        ("Normal", "Male"),
        ("Sports and travel", 33.0),
        (2024, 3, 9, 15, 45),
        ("A", "Yangon"),
        "Cash",
        3,
    )];

    warehouse.synchronize(&rows).await?;

    let times = warehouse.dimension(DimensionKind::Time).await?;
    let [DimensionRow::Time(time)] = times.as_slice() else {
        panic!("expected a single dim_time row");
    };

    assert_eq!(time.date, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    assert_eq!(time.time, NaiveTime::from_hms_opt(15, 45, 0).unwrap());
    assert_eq!(time.year, 2024);
    assert_eq!(time.month, 3);
    assert_eq!(time.day, 9);
    assert_eq!(time.quarter, 1);
    assert_eq!(time.weekday, 5);
    assert!(time.is_weekend);

    Ok(())
}

pub async fn test_missing_field(warehouse: &Warehouse) -> anyhow::Result<()> {
    let mut rows = batch();
    rows[2].gender = None;

    let err = warehouse.synchronize(&rows).await.unwrap_err();

    let StoreError::Synchronize(failures) = err else {
        panic!("expected a synchronize error");
    };

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].dimension, DimensionKind::Customer);
    assert!(failures[0].error.is_validation());
    assert_eq!(
        failures[0].error.to_string(),
        "staging row 2 is missing `gender` required by dim_customer"
    );

    assert_eq!(warehouse.dimension(DimensionKind::Customer).await?.len(), 0);
    assert_eq!(warehouse.dimension(DimensionKind::Branch).await?.len(), 2);
    assert_eq!(warehouse.dimension(DimensionKind::Payment).await?.len(), 3);

    Ok(())
}

pub async fn test_concurrency(warehouse: &Warehouse) -> anyhow::Result<()> {
    let rows = batch();

    let results = join_all((0..8).map(|_| warehouse.synchronize(&rows))).await;

    let mut inserted = 0;
    for result in results {
        inserted += result?.total();
    }

    assert_eq!(inserted, 21);

    for kind in DimensionKind::ALL {
        let stored = keys(warehouse, kind).await?;
        let distinct = stored.iter().collect::<HashSet<_>>();

        assert_eq!(stored.len(), distinct.len(), "{kind}");
    }

    Ok(())
}

pub async fn test_load_sales(warehouse: &Warehouse) -> anyhow::Result<()> {
    let rows = batch();
    warehouse.synchronize(&rows).await?;

    let inserted = warehouse.load_sales(&rows, 4).await?;
    assert_eq!(inserted, 6);

    let sales = warehouse.sales().await?;
    assert_eq!(sales.len(), 6);
    assert_eq!(sales[0].invoice_id, "750-67-8428");
    assert_eq!(sales[0].quantity, 7);

    let lookup = warehouse.lookup().await?;
    for (sale, row) in sales.iter().zip(rows.iter()) {
        assert_eq!(
            Some(sale.branch_id),
            lookup.get(&row.key(DimensionKind::Branch, 0)?)
        );
        assert_eq!(
            Some(sale.time_id),
            lookup.get(&row.key(DimensionKind::Time, 0)?)
        );
    }

    let summary = warehouse.summary().await?;
    assert_eq!(summary.len(), 6);
    assert_eq!(summary[1].invoice_id, "226-31-3081");
    assert_eq!(summary[1].customer_type, "Normal");
    assert_eq!(summary[1].product_line, "Electronic accessories");
    assert_eq!(summary[1].city, "Naypyitaw");
    assert_eq!(summary[1].payment_method, "Cash");
    assert_eq!(summary[1].quarter, 1);

    let existing = warehouse
        .existing_invoices(vec!["750-67-8428".to_owned(), "000-00-0000".to_owned()])
        .await?;
    assert_eq!(existing, HashSet::from(["750-67-8428".to_owned()]));

    let counts = warehouse.counts().await?;
    assert_eq!(counts[Table::Sales.name()], 6);
    assert_eq!(counts["dim_customer"], 4);
    assert_eq!(counts["dim_branch"], 2);
    assert_eq!(counts.len(), 6);

    Ok(())
}

pub async fn test_duplicate_invoice(warehouse: &Warehouse) -> anyhow::Result<()> {
    let rows = batch();
    warehouse.synchronize(&rows).await?;
    warehouse.load_sales(&rows[..2], 50).await?;

    let err = warehouse.load_sales(&rows[1..4], 50).await.unwrap_err();
    assert!(err.is_integrity());
    assert!(matches!(err, StoreError::DuplicateInvoice(ref id) if id == "226-31-3081"));

    let mut repeated = rows[2..4].to_vec();
    repeated.push(rows[2].clone());

    let err = warehouse.load_sales(&repeated, 50).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateInvoice(ref id) if id == "631-41-3108"));

    assert_eq!(warehouse.sales().await?.len(), 2);

    Ok(())
}

pub async fn test_unresolved_dimension(warehouse: &Warehouse) -> anyhow::Result<()> {
    let rows = batch();
    warehouse
        .synchronize_dimension(DimensionKind::Customer, &rows)
        .await?;

    let err = warehouse.load_sales(&rows, 50).await.unwrap_err();
    assert!(err.is_integrity());
    assert!(matches!(
        err,
        StoreError::MissingDimension {
            table: "dim_product",
            ..
        }
    ));

    warehouse.synchronize(&rows).await?;

    let err = warehouse
        .insert_sales(vec![NewSale {
            invoice_id: "999-99-9999".to_owned(),
            customer_id: 1,
            product_id: 1,
            time_id: 1,
            branch_id: 1,
            payment_id: 404,
            quantity: 1,
            tax_5_percent: 0.5,
            sales: 10.5,
            cogs: 10.0,
            gross_margin_percentage: 4.761904762,
            gross_income: 0.5,
            rating: 6.0,
        }])
        .await
        .unwrap_err();

    assert!(err.is_integrity());
    assert_eq!(warehouse.sales().await?.len(), 0);

    Ok(())
}

pub async fn test_partial_load(warehouse: &Warehouse) -> anyhow::Result<()> {
    let rows = batch();
    warehouse.synchronize(&rows).await?;
    warehouse.load_sales(&rows[..1], 50).await?;

    let interrupted = vec![rows[2].clone(), rows[3].clone(), rows[0].clone()];
    let err = warehouse.load_sales(&interrupted, 2).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateInvoice(ref id) if id == "750-67-8428"));

    let loaded = warehouse
        .sales()
        .await?
        .into_iter()
        .map(|sale| sale.invoice_id)
        .collect::<Vec<_>>();
    assert_eq!(loaded, vec!["750-67-8428", "631-41-3108", "123-19-1176"]);

    let existing = warehouse
        .existing_invoices(
            rows.iter()
                .filter_map(|row| row.invoice_id.to_owned())
                .collect(),
        )
        .await?;
    assert_eq!(existing.len(), 3);

    let remaining = rows
        .into_iter()
        .filter(|row| {
            row.invoice_id
                .as_ref()
                .is_some_and(|id| !existing.contains(id))
        })
        .collect::<Vec<_>>();

    assert_eq!(warehouse.load_sales(&remaining, 2).await?, 3);
    assert_eq!(warehouse.sales().await?.len(), 6);

    Ok(())
}

pub async fn test_wrong_dimension<E>(engine: &E) -> anyhow::Result<()>
where
    E: Engine + Clone + 'static,
{
    let keys = vec![
        DimensionKey::Branch {
            branch: "A".to_owned(),
            city: "Yangon".to_owned(),
        },
        DimensionKey::Payment {
            payment_method: "Cash".to_owned(),
        },
    ];

    let err = engine
        .insert_missing(DimensionKind::Branch, keys)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(
        err.to_string(),
        "dim_branch cannot store the dim_payment key (Cash)"
    );

    let warehouse = Warehouse::new(engine.clone());
    assert_eq!(warehouse.dimension(DimensionKind::Branch).await?.len(), 0);
    assert_eq!(warehouse.dimension(DimensionKind::Payment).await?.len(), 0);

    Ok(())
}
