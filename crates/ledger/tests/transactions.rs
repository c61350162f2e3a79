use chrono::{Duration, Utc};
use sea_orm::Database;

use ledger::{Engine, LedgerError, TransactionKind};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

async fn engine_with_file_db() -> (Engine, std::path::PathBuf) {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();

    let path = root.join(format!("ledger_{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();

    (engine, path)
}

#[tokio::test]
async fn add_transaction_moves_balance() {
    let engine = engine_with_db().await;
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", Utc::now())
        .await
        .unwrap();

    let sale = engine
        .add_transaction(1, customer.id, 5000, Some("groceries"), Utc::now())
        .await
        .unwrap();
    assert_eq!(sale.kind, TransactionKind::Sale);
    assert_eq!(sale.amount_minor, 5000);

    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.balance_minor, 5000);

    // A negative amount is a repayment.
    let payment = engine
        .add_transaction(1, customer.id, -2000, None, Utc::now())
        .await
        .unwrap();
    assert_eq!(payment.kind, TransactionKind::Payment);

    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.balance_minor, 3000);
}

#[tokio::test]
async fn add_transaction_rejects_zero_amount() {
    let engine = engine_with_db().await;
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", Utc::now())
        .await
        .unwrap();

    let err = engine
        .add_transaction(1, customer.id, 0, None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn add_transaction_unknown_customer_fails() {
    let engine = engine_with_db().await;

    let err = engine
        .add_transaction(1, uuid::Uuid::new_v4(), 5000, None, Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("customer".to_string()));
}

#[tokio::test]
async fn settle_stores_negative_amount_whatever_the_sign() {
    let engine = engine_with_db().await;
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", Utc::now())
        .await
        .unwrap();
    engine
        .add_transaction(1, customer.id, 5000, Some("groceries"), Utc::now())
        .await
        .unwrap();

    let payment = engine
        .settle(1, customer.id, 2000, Some("partial"), Utc::now())
        .await
        .unwrap();
    assert_eq!(payment.kind, TransactionKind::Payment);
    assert_eq!(payment.amount_minor, -2000);

    let payment = engine
        .settle(1, customer.id, -1000, None, Utc::now())
        .await
        .unwrap();
    assert_eq!(payment.amount_minor, -1000);

    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.balance_minor, 2000);

    let err = engine
        .settle(1, customer.id, 0, None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn list_history_is_ordered_oldest_first() {
    let engine = engine_with_db().await;
    let t0 = Utc::now();
    let customer = engine.add_customer(1, "John Doe", "", t0).await.unwrap();

    engine
        .add_transaction(1, customer.id, 1000, Some("first"), t0 + Duration::seconds(1))
        .await
        .unwrap();
    engine
        .add_transaction(1, customer.id, 2000, Some("second"), t0 + Duration::seconds(2))
        .await
        .unwrap();
    engine
        .settle(1, customer.id, 500, Some("third"), t0 + Duration::seconds(3))
        .await
        .unwrap();

    let history = engine.list_history(1, customer.id).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].description.as_deref(), Some("first"));
    assert_eq!(history[1].description.as_deref(), Some("second"));
    assert_eq!(history[2].description.as_deref(), Some("third"));
    assert!(history.windows(2).all(|w| w[0].created_at <= w[1].created_at));

    let err = engine
        .list_history(1, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("customer".to_string()));
}

#[tokio::test]
async fn balance_always_equals_transaction_sum() {
    let engine = engine_with_db().await;
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", Utc::now())
        .await
        .unwrap();

    for amount in [5000, -1500, 300, -300, 700] {
        engine
            .add_transaction(1, customer.id, amount, None, Utc::now())
            .await
            .unwrap();

        let stored = engine.customer(1, customer.id).await.unwrap();
        let sum: i64 = engine
            .list_history(1, customer.id)
            .await
            .unwrap()
            .iter()
            .map(|tx| tx.amount_minor)
            .sum();
        assert_eq!(stored.balance_minor, sum);
    }
}

#[tokio::test]
async fn blank_descriptions_are_dropped() {
    let engine = engine_with_db().await;
    let customer = engine
        .add_customer(1, "John Doe", "", Utc::now())
        .await
        .unwrap();

    let tx = engine
        .add_transaction(1, customer.id, 1000, Some("   "), Utc::now())
        .await
        .unwrap();
    assert_eq!(tx.description, None);

    let tx = engine
        .add_transaction(1, customer.id, 1000, Some("  milk  "), Utc::now())
        .await
        .unwrap();
    assert_eq!(tx.description.as_deref(), Some("milk"));
}

#[tokio::test]
async fn concurrent_transactions_on_one_customer_both_commit() {
    let (engine, path) = engine_with_file_db().await;
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", Utc::now())
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        engine.add_transaction(1, customer.id, 5000, Some("a"), Utc::now()),
        engine.add_transaction(1, customer.id, 7000, Some("b"), Utc::now()),
    );
    a.unwrap();
    b.unwrap();

    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.balance_minor, 12000);
    assert_eq!(engine.list_history(1, customer.id).await.unwrap().len(), 2);

    let _ = std::fs::remove_file(path);
}
