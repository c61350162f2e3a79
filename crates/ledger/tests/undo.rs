use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use ledger::{ActionKind, Engine, LedgerError, UndoTarget};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build().await.unwrap();
    (engine, db)
}

#[tokio::test]
async fn undo_add_transaction_restores_balance() {
    let (engine, _db) = engine_with_db().await;
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", Utc::now())
        .await
        .unwrap();
    engine
        .add_transaction(1, customer.id, 5000, Some("groceries"), Utc::now())
        .await
        .unwrap();

    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.balance_minor, 5000);

    let reversed = engine.undo(1, UndoTarget::Last, Utc::now()).await.unwrap();
    assert_eq!(reversed.kind, ActionKind::AddTransaction);
    assert!(reversed.reversed);
    assert!(reversed.reversed_at.is_some());

    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.balance_minor, 0);
    assert!(engine.list_history(1, customer.id).await.unwrap().is_empty());

    // The log entry survives, flagged as reversed.
    let recent = engine.list_recent_actions(1, 10).await.unwrap();
    let logged = recent.iter().find(|a| a.id == reversed.id).unwrap();
    assert!(logged.reversed);
}

#[tokio::test]
async fn undo_twice_fails_and_changes_nothing() {
    let (engine, _db) = engine_with_db().await;
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", Utc::now())
        .await
        .unwrap();
    engine
        .add_transaction(1, customer.id, 5000, None, Utc::now())
        .await
        .unwrap();

    let reversed = engine.undo(1, UndoTarget::Last, Utc::now()).await.unwrap();

    let err = engine
        .undo(1, UndoTarget::Action(reversed.id), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::State(_)));

    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.balance_minor, 0);
}

#[tokio::test]
async fn undo_add_customer_removes_it() {
    let (engine, _db) = engine_with_db().await;
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", Utc::now())
        .await
        .unwrap();

    engine.undo(1, UndoTarget::Last, Utc::now()).await.unwrap();

    let err = engine.customer(1, customer.id).await.unwrap_err();
    assert_eq!(err, LedgerError::NotFound("customer".to_string()));
}

#[tokio::test]
async fn undo_add_customer_with_transactions_conflicts() {
    let (engine, _db) = engine_with_db().await;
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", Utc::now())
        .await
        .unwrap();
    engine
        .add_transaction(1, customer.id, 5000, None, Utc::now())
        .await
        .unwrap();

    let recent = engine.list_recent_actions(1, 10).await.unwrap();
    let add_customer_action = recent
        .iter()
        .find(|a| a.kind == ActionKind::AddCustomer)
        .unwrap();

    let err = engine
        .undo(1, UndoTarget::Action(add_customer_action.id), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));

    // Still there, untouched.
    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.balance_minor, 5000);
}

#[tokio::test]
async fn undo_delete_restores_customer_verbatim() {
    let (engine, _db) = engine_with_db().await;
    let t0 = Utc::now();
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", t0)
        .await
        .unwrap();
    engine
        .add_transaction(1, customer.id, 2000, Some("groceries"), t0 + Duration::seconds(1))
        .await
        .unwrap();
    engine
        .settle(1, customer.id, 2000, Some("paid up"), t0 + Duration::seconds(2))
        .await
        .unwrap();

    let before = engine.customer(1, customer.id).await.unwrap();
    let history_before = engine.list_history(1, customer.id).await.unwrap();
    assert_eq!(before.balance_minor, 0);

    engine
        .delete_customer(1, customer.id, t0 + Duration::seconds(3))
        .await
        .unwrap();
    assert!(engine.customer(1, customer.id).await.is_err());

    let reversed = engine
        .undo(1, UndoTarget::Last, t0 + Duration::seconds(4))
        .await
        .unwrap();
    assert_eq!(reversed.kind, ActionKind::DeleteCustomer);

    let restored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(restored, before);

    let history_after = engine.list_history(1, customer.id).await.unwrap();
    assert_eq!(history_after, history_before);
}

#[tokio::test]
async fn undo_reverses_only_the_most_recent_action() {
    let (engine, _db) = engine_with_db().await;
    let t0 = Utc::now();
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", t0)
        .await
        .unwrap();
    engine
        .add_transaction(1, customer.id, 5000, Some("first"), t0 + Duration::seconds(1))
        .await
        .unwrap();
    engine
        .add_transaction(1, customer.id, 7000, Some("second"), t0 + Duration::seconds(2))
        .await
        .unwrap();

    engine
        .undo(1, UndoTarget::Last, t0 + Duration::seconds(3))
        .await
        .unwrap();

    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.balance_minor, 5000);

    let history = engine.list_history(1, customer.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].description.as_deref(), Some("first"));
}

#[tokio::test]
async fn undo_by_id_can_target_an_older_transaction() {
    let (engine, _db) = engine_with_db().await;
    let t0 = Utc::now();
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", t0)
        .await
        .unwrap();
    engine
        .add_transaction(1, customer.id, 5000, Some("first"), t0 + Duration::seconds(1))
        .await
        .unwrap();
    engine
        .add_transaction(1, customer.id, 7000, Some("second"), t0 + Duration::seconds(2))
        .await
        .unwrap();

    // Oldest add_transaction action (the list is newest first).
    let recent = engine.list_recent_actions(1, 10).await.unwrap();
    let first_tx_action = recent
        .iter()
        .filter(|a| a.kind == ActionKind::AddTransaction)
        .next_back()
        .unwrap();

    engine
        .undo(1, UndoTarget::Action(first_tx_action.id), t0 + Duration::seconds(3))
        .await
        .unwrap();

    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.balance_minor, 7000);
    let history = engine.list_history(1, customer.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].description.as_deref(), Some("second"));
}

#[tokio::test]
async fn undo_scope_is_per_admin() {
    let (engine, _db) = engine_with_db().await;
    let t0 = Utc::now();
    let mine = engine.add_customer(1, "John Doe", "111", t0).await.unwrap();
    engine
        .add_transaction(1, mine.id, 5000, None, t0 + Duration::seconds(1))
        .await
        .unwrap();
    let theirs = engine
        .add_customer(2, "Jane Roe", "222", t0 + Duration::seconds(2))
        .await
        .unwrap();

    // Admin 2 undoes their own latest action, not admin 1's transaction.
    let reversed = engine
        .undo(2, UndoTarget::Last, t0 + Duration::seconds(3))
        .await
        .unwrap();
    assert_eq!(reversed.kind, ActionKind::AddCustomer);
    assert!(engine.customer(2, theirs.id).await.is_err());

    let stored = engine.customer(1, mine.id).await.unwrap();
    assert_eq!(stored.balance_minor, 5000);

    // Another admin's action id is invisible.
    let admin1_actions = engine.list_recent_actions(1, 10).await.unwrap();
    let err = engine
        .undo(2, UndoTarget::Action(admin1_actions[0].id), Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::NotFound("action".to_string()));
}

#[tokio::test]
async fn undo_rename_restores_old_name() {
    let (engine, _db) = engine_with_db().await;
    let customer = engine
        .add_customer(1, "Old Name", "321", Utc::now())
        .await
        .unwrap();
    engine
        .rename_customer(1, customer.id, "New Name", Utc::now())
        .await
        .unwrap();

    engine.undo(1, UndoTarget::Last, Utc::now()).await.unwrap();

    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.fullname, "Old Name");
}

#[tokio::test]
async fn undo_change_phone_restores_old_phone() {
    let (engine, _db) = engine_with_db().await;
    let customer = engine
        .add_customer(1, "John Doe", "0590000000", Utc::now())
        .await
        .unwrap();
    engine
        .change_phone(1, customer.id, "0598765432", Utc::now())
        .await
        .unwrap();

    engine.undo(1, UndoTarget::Last, Utc::now()).await.unwrap();

    let stored = engine.customer(1, customer.id).await.unwrap();
    assert_eq!(stored.phone, "0590000000");
}

#[tokio::test]
async fn undo_with_empty_history_fails() {
    let (engine, _db) = engine_with_db().await;

    let err = engine.undo(1, UndoTarget::Last, Utc::now()).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn recent_actions_are_newest_first_and_bounded() {
    let (engine, _db) = engine_with_db().await;
    let t0 = Utc::now();
    let customer = engine.add_customer(1, "John Doe", "", t0).await.unwrap();
    for i in 0..4 {
        engine
            .add_transaction(1, customer.id, 1000, None, t0 + Duration::seconds(i + 1))
            .await
            .unwrap();
    }

    let recent = engine.list_recent_actions(1, 3).await.unwrap();
    assert_eq!(recent.len(), 3);
    assert!(recent
        .windows(2)
        .all(|w| (w[0].created_at, w[0].id) > (w[1].created_at, w[1].id)));
}

#[tokio::test]
async fn archive_moves_only_rows_older_than_cutoff() {
    let (engine, db) = engine_with_db().await;
    let now = Utc::now();

    // One stale action and one fresh one.
    let customer = engine
        .add_customer(1, "John Doe", "111", now - Duration::days(40))
        .await
        .unwrap();
    engine
        .add_transaction(1, customer.id, 1000, None, now)
        .await
        .unwrap();

    let moved = engine.archive_actions(now - Duration::days(30)).await.unwrap();
    assert_eq!(moved, 1);

    let recent = engine.list_recent_actions(1, 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].kind, ActionKind::AddTransaction);

    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            "SELECT COUNT(*) AS c FROM actions_archive;",
        ))
        .await
        .unwrap()
        .unwrap();
    let archived: i64 = row.try_get("", "c").unwrap();
    assert_eq!(archived, 1);
}
