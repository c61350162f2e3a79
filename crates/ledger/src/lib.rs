pub use actions::{Action, ActionKind, ActionPayload};
pub use customers::Customer;
pub use error::LedgerError;
pub use ops::{CustomerHit, CustomerSummary, Engine, EngineBuilder, UndoTarget};
pub use transactions::{Transaction, TransactionKind};

mod actions;
mod customers;
mod error;
mod ops;
mod transactions;
mod util;

pub(crate) type ResultLedger<T> = Result<T, LedgerError>;
