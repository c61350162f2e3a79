//! Transaction primitives.
//!
//! A `Transaction` is an atomic balance change for one customer. Amounts
//! are signed minor units: positive rows are new debt (`Sale`), negative
//! rows settle debt (`Payment`).

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, ResultLedger, util};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Sale,
    Payment,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Payment => "payment",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "sale" => Ok(Self::Sale),
            "payment" => Ok(Self::Payment),
            other => Err(LedgerError::Validation(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub admin_id: i64,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        customer_id: Uuid,
        admin_id: i64,
        amount_minor: i64,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> ResultLedger<Self> {
        if amount_minor == 0 {
            return Err(LedgerError::Validation(
                "amount_minor must not be 0".to_string(),
            ));
        }
        let kind = if amount_minor > 0 {
            TransactionKind::Sale
        } else {
            TransactionKind::Payment
        };
        Ok(Self {
            id: Uuid::new_v4(),
            customer_id,
            admin_id,
            kind,
            amount_minor,
            description,
            created_at,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub customer_id: String,
    pub admin_id: i64,
    pub kind: String,
    pub amount_minor: i64,
    pub description: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id"
    )]
    Customers,
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            customer_id: ActiveValue::Set(tx.customer_id.to_string()),
            admin_id: ActiveValue::Set(tx.admin_id),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            description: ActiveValue::Set(tx.description.clone()),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: util::parse_uuid(&model.id, "transaction")?,
            customer_id: util::parse_uuid(&model.customer_id, "customer")?,
            admin_id: model.admin_id,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            amount_minor: model.amount_minor,
            description: model.description,
            created_at: model.created_at,
        })
    }
}
