use std::path::{Path, PathBuf};

use salesmart::{
    export, store::DimensionKind, store::StoreError, ConfigBuilder, Pipeline, PipelineError,
    Report,
};

pub fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn source() -> PathBuf {
    fixtures().join("sales.csv")
}

pub fn ragged_source() -> PathBuf {
    fixtures().join("ragged/sales.csv")
}

pub fn builder() -> ConfigBuilder {
    ConfigBuilder::new()
        .raw_dir(fixtures())
        .fact_batch_size(2)
        .save_processed(false)
}

pub async fn test_run(pipeline: &Pipeline) -> anyhow::Result<()> {
    let report = pipeline.run(Some(&source())).await?;

    assert_eq!(report.extracted, 6);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.quality.incomplete, 1);
    assert_eq!(report.quality.missing.get("gender"), Some(&1));

    assert_eq!(report.synchronized.get(DimensionKind::Customer), 4);
    assert_eq!(report.synchronized.get(DimensionKind::Product), 5);
    assert_eq!(report.synchronized.get(DimensionKind::Time), 5);
    assert_eq!(report.synchronized.get(DimensionKind::Branch), 2);
    assert_eq!(report.synchronized.get(DimensionKind::Payment), 3);

    assert_eq!(report.skipped, 0);
    assert_eq!(report.loaded, 5);
    assert_eq!(report.counts.get("fact_sales"), Some(&5));
    assert_eq!(report.counts.get("dim_customer"), Some(&4));
    assert!(report.processed.is_empty());

    Ok(())
}

pub async fn test_rerun(pipeline: &Pipeline) -> anyhow::Result<()> {
    pipeline.run(Some(&source())).await?;
    let report = pipeline.run(Some(&source())).await?;

    assert_eq!(report.synchronized.total(), 0);
    assert_eq!(report.skipped, 5);
    assert_eq!(report.loaded, 0);
    assert_eq!(report.counts.get("fact_sales"), Some(&5));
    assert_eq!(report.counts.get("dim_product"), Some(&5));

    Ok(())
}

pub async fn test_synchronize(pipeline: &Pipeline) -> anyhow::Result<()> {
    let report = pipeline.synchronize(Some(&source())).await?;
    assert_eq!(report.total(), 19);

    let report = pipeline.synchronize(Some(&source())).await?;
    assert_eq!(report.total(), 0);

    let counts = pipeline.warehouse().counts().await?;
    assert_eq!(counts.get("dim_payment"), Some(&3));
    assert_eq!(counts.get("fact_sales"), Some(&0));

    Ok(())
}

pub async fn test_default_source(pipeline: &Pipeline) -> anyhow::Result<()> {
    let report = pipeline.run(None).await?;

    assert_eq!(report.source, source());
    assert_eq!(report.loaded, 5);

    Ok(())
}

pub async fn test_keep_incomplete(pipeline: &Pipeline) -> anyhow::Result<()> {
    let Err(PipelineError::Store(StoreError::Synchronize(failures))) =
        pipeline.run(Some(&source())).await
    else {
        panic!("expected a synchronize error");
    };

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].dimension, DimensionKind::Customer);
    assert!(failures[0].error.is_validation());

    let counts = pipeline.warehouse().counts().await?;
    assert_eq!(counts.get("dim_product"), Some(&6));
    assert_eq!(counts.get("dim_branch"), Some(&2));
    assert_eq!(counts.get("fact_sales"), Some(&0));

    Ok(())
}

pub async fn test_report(pipeline: &Pipeline) -> anyhow::Result<()> {
    pipeline.run(Some(&source())).await?;

    let report = Report::from_warehouse(pipeline.warehouse()).await?;

    assert_eq!(report.by_branch.len(), 2);
    assert_eq!(report.by_branch[0].branch, "A");
    assert_eq!(report.by_branch[0].city, "Yangon");
    assert_eq!(report.by_branch[0].transaction_count, 4);

    assert_eq!(report.by_product[0].product_line, "Health and beauty");
    assert_eq!(report.by_product[0].transaction_count, 2);

    let months = report
        .monthly
        .iter()
        .map(|m| (m.year, m.month, m.transaction_count))
        .collect::<Vec<_>>();
    assert_eq!(months, vec![(2019, 1, 2), (2019, 2, 1), (2019, 3, 2)]);

    assert_eq!(report.customers.len(), 4);
    assert_eq!(
        report.summary.iter().map(|line| line.transaction_count).sum::<i64>(),
        5
    );

    Ok(())
}

pub async fn test_export(pipeline: &Pipeline, dir: &Path) -> anyhow::Result<()> {
    pipeline.run(Some(&source())).await?;

    let report = export(pipeline.warehouse(), dir).await?;

    assert!(report.failed.is_empty());
    assert_eq!(report.written.len(), 11);

    for name in [
        "sales_summary",
        "dim_customer",
        "dim_time",
        "fact_sales",
        "sales_by_product",
        "monthly_sales_trend",
        "customer_analysis",
    ] {
        assert!(dir.join(format!("{name}.csv")).is_file(), "{name}.csv");
    }

    let mut reader = csv::Reader::from_path(dir.join("sales_by_branch.csv"))?;
    let headers = reader.headers()?.clone();
    assert_eq!(headers.get(0), Some("branch"));

    let records = reader.records().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get(0), Some("A"));

    let mut reader = csv::Reader::from_path(dir.join("fact_sales.csv"))?;
    assert_eq!(reader.records().count(), 5);

    Ok(())
}

pub async fn test_ragged_source(pipeline: &Pipeline) -> anyhow::Result<()> {
    let report = pipeline.run(Some(&ragged_source())).await?;

    assert_eq!(report.extracted, 3);
    assert_eq!(report.dropped, 1);
    assert_eq!(report.quality.missing.get("rating"), Some(&1));
    assert_eq!(report.quality.missing.get("cogs"), None);
    assert_eq!(report.loaded, 2);
    assert_eq!(report.counts.get("fact_sales"), Some(&2));

    Ok(())
}

pub async fn test_resume(pipeline: &Pipeline) -> anyhow::Result<()> {
    let staged = pipeline.stage(Some(&source())).await?;
    pipeline.warehouse().synchronize(&staged.rows).await?;
    pipeline.warehouse().load_sales(&staged.rows[..2], 2).await?;

    let report = pipeline.run(Some(&source())).await?;

    assert_eq!(report.synchronized.total(), 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.loaded, 3);
    assert_eq!(report.counts.get("fact_sales"), Some(&5));

    Ok(())
}

pub async fn test_empty_export(pipeline: &Pipeline, dir: &Path) -> anyhow::Result<()> {
    let report = export(pipeline.warehouse(), dir).await?;

    assert!(report.failed.is_empty());
    assert_eq!(report.written.len(), 11);

    for (name, first) in [
        ("sales_summary", "sales_id"),
        ("dim_customer", "customer_id"),
        ("dim_time", "time_id"),
        ("fact_sales", "sales_id"),
        ("sales_by_branch", "branch"),
        ("customer_analysis", "customer_type"),
    ] {
        let mut reader = csv::Reader::from_path(dir.join(format!("{name}.csv")))?;
        assert_eq!(reader.headers()?.get(0), Some(first), "{name}.csv");
        assert_eq!(reader.records().count(), 0, "{name}.csv");
    }

    Ok(())
}

pub async fn test_processed_snapshot(pipeline: &Pipeline) -> anyhow::Result<()> {
    let dir = pipeline.config().data_paths.processed.to_owned();
    let report = pipeline.run(Some(&source())).await?;

    assert_eq!(report.processed.len(), 6);
    assert!(report.processed.contains(&dir.join("dim_payment.csv")));

    let mut reader = csv::Reader::from_path(dir.join("fact_sales.csv"))?;
    assert_eq!(reader.records().count(), 5);

    let mut reader = csv::Reader::from_path(dir.join("dim_branch.csv"))?;
    assert_eq!(reader.headers()?.get(1), Some("branch"));
    assert_eq!(reader.records().count(), 2);

    Ok(())
}
