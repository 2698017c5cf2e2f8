#![cfg(feature = "memory")]
mod warehouse;

use salesmart_store::{Memory, Warehouse};

async fn create_warehouse() -> Warehouse {
    let warehouse = Warehouse::memory();
    warehouse.migrate().await.unwrap();
    warehouse
}

#[tokio_shared_rt::test]
async fn synchronize() {
    let warehouse = create_warehouse().await;
    warehouse::test_synchronize(&warehouse).await.unwrap();
}

#[tokio_shared_rt::test]
async fn idempotence() {
    let warehouse = create_warehouse().await;
    warehouse::test_idempotence(&warehouse).await.unwrap();
}

#[tokio_shared_rt::test]
async fn customer_pair() {
    let warehouse = create_warehouse().await;
    warehouse::test_customer_pair(&warehouse).await.unwrap();
}

#[tokio_shared_rt::test]
async fn existing_branch_unchanged() {
    let warehouse = create_warehouse().await;
    warehouse::test_existing_branch_unchanged(&warehouse)
        .await
        .unwrap();
}

#[tokio_shared_rt::test]
async fn time_attributes() {
    let warehouse = create_warehouse().await;
    warehouse::test_time_attributes(&warehouse).await.unwrap();
}

#[tokio_shared_rt::test]
async fn missing_field() {
    let warehouse = create_warehouse().await;
    warehouse::test_missing_field(&warehouse).await.unwrap();
}

#[tokio_shared_rt::test]
async fn concurrency() {
    let warehouse = create_warehouse().await;
    warehouse::test_concurrency(&warehouse).await.unwrap();
}

#[tokio_shared_rt::test]
async fn load_sales() {
    let warehouse = create_warehouse().await;
    warehouse::test_load_sales(&warehouse).await.unwrap();
}

#[tokio_shared_rt::test]
async fn duplicate_invoice() {
    let warehouse = create_warehouse().await;
    warehouse::test_duplicate_invoice(&warehouse).await.unwrap();
}

#[tokio_shared_rt::test]
async fn unresolved_dimension() {
    let warehouse = create_warehouse().await;
    warehouse::test_unresolved_dimension(&warehouse)
        .await
        .unwrap();
}

#[tokio_shared_rt::test]
async fn partial_load() {
    let warehouse = create_warehouse().await;
    warehouse::test_partial_load(&warehouse).await.unwrap();
}

#[tokio_shared_rt::test]
async fn wrong_dimension() {
    warehouse::test_wrong_dimension(&Memory::default())
        .await
        .unwrap();
}
