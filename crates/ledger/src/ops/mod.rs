use std::collections::HashMap;
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::ResultLedger;

mod actions;
mod customers;
mod transactions;
mod undo;

pub use customers::{CustomerHit, CustomerSummary};
pub use undo::UndoTarget;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Handle over the record store. One logical writer per customer: every
/// mutating operation holds that customer's lock across its database
/// transaction, so history appends and balance updates stay serialized.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    customer_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Acquire the per-customer write lock.
    ///
    /// The guard owns the lock, so it can be held across the whole
    /// mutating operation regardless of borrow scopes.
    pub(crate) async fn lock_customer(&self, customer_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.customer_locks.lock().await;
            locks
                .entry(customer_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultLedger<Engine> {
        Ok(Engine {
            database: self.database,
            customer_locks: Mutex::new(HashMap::new()),
        })
    }
}
