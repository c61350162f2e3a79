//! Action history primitives.
//!
//! Every mutating operation appends an `Action`: who did what to which
//! customer, plus a payload holding exactly the data needed to invert the
//! operation later. The auto-increment row id doubles as the monotonic
//! sequence number that breaks `created_at` ties.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Customer, LedgerError, ResultLedger, Transaction, util};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AddCustomer,
    AddTransaction,
    Settle,
    RenameCustomer,
    ChangePhone,
    DeleteCustomer,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddCustomer => "add_customer",
            Self::AddTransaction => "add_transaction",
            Self::Settle => "settle",
            Self::RenameCustomer => "rename_customer",
            Self::ChangePhone => "change_phone",
            Self::DeleteCustomer => "delete_customer",
        }
    }
}

impl TryFrom<&str> for ActionKind {
    type Error = LedgerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "add_customer" => Ok(Self::AddCustomer),
            "add_transaction" => Ok(Self::AddTransaction),
            "settle" => Ok(Self::Settle),
            "rename_customer" => Ok(Self::RenameCustomer),
            "change_phone" => Ok(Self::ChangePhone),
            "delete_customer" => Ok(Self::DeleteCustomer),
            other => Err(LedgerError::Validation(format!(
                "invalid action kind: {other}"
            ))),
        }
    }
}

/// Per-kind undo data, stored as JSON in the `payload` column.
///
/// Each variant carries exactly what the inverse operation needs, nothing
/// more. `DeleteCustomer` snapshots the whole customer with its
/// transactions so undo can resurrect it verbatim, original ids included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionPayload {
    AddCustomer {
        fullname: String,
        phone: String,
        created_at: DateTime<Utc>,
    },
    AddTransaction {
        transaction_id: Uuid,
        amount_minor: i64,
        description: Option<String>,
        created_at: DateTime<Utc>,
    },
    Settle {
        transaction_id: Uuid,
        amount_minor: i64,
        description: Option<String>,
        created_at: DateTime<Utc>,
    },
    RenameCustomer {
        old_fullname: String,
    },
    ChangePhone {
        old_phone: String,
    },
    DeleteCustomer {
        customer: Customer,
        transactions: Vec<Transaction>,
    },
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::AddCustomer { .. } => ActionKind::AddCustomer,
            Self::AddTransaction { .. } => ActionKind::AddTransaction,
            Self::Settle { .. } => ActionKind::Settle,
            Self::RenameCustomer { .. } => ActionKind::RenameCustomer,
            Self::ChangePhone { .. } => ActionKind::ChangePhone,
            Self::DeleteCustomer { .. } => ActionKind::DeleteCustomer,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: i64,
    pub admin_id: i64,
    pub customer_id: Uuid,
    pub kind: ActionKind,
    pub payload: ActionPayload,
    pub created_at: DateTime<Utc>,
    pub reversed: bool,
    pub reversed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "actions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub admin_id: i64,
    pub customer_id: String,
    pub kind: String,
    pub payload: String,
    pub created_at: DateTimeUtc,
    pub reversed: bool,
    pub reversed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Build the row for a fresh action; the store assigns the id.
pub(crate) fn active_for_insert(
    admin_id: i64,
    customer_id: Uuid,
    payload: &ActionPayload,
    created_at: DateTime<Utc>,
) -> ResultLedger<ActiveModel> {
    let encoded = serde_json::to_string(payload)
        .map_err(|err| LedgerError::State(format!("action payload does not encode: {err}")))?;
    Ok(ActiveModel {
        id: ActiveValue::NotSet,
        admin_id: ActiveValue::Set(admin_id),
        customer_id: ActiveValue::Set(customer_id.to_string()),
        kind: ActiveValue::Set(payload.kind().as_str().to_string()),
        payload: ActiveValue::Set(encoded),
        created_at: ActiveValue::Set(created_at),
        reversed: ActiveValue::Set(false),
        reversed_at: ActiveValue::Set(None),
    })
}

impl TryFrom<Model> for Action {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let kind = ActionKind::try_from(model.kind.as_str())?;
        let payload: ActionPayload = serde_json::from_str(&model.payload).map_err(|err| {
            LedgerError::State(format!("action {} payload does not decode: {err}", model.id))
        })?;
        if payload.kind() != kind {
            return Err(LedgerError::State(format!(
                "action {} payload kind mismatch",
                model.id
            )));
        }
        Ok(Self {
            id: model.id,
            admin_id: model.admin_id,
            customer_id: util::parse_uuid(&model.customer_id, "customer")?,
            kind,
            payload,
            created_at: model.created_at,
            reversed: model.reversed,
            reversed_at: model.reversed_at,
        })
    }
}

/// Archived actions moved out of the live table by the retention sweep.
pub(crate) mod archive {
    use sea_orm::{ActiveValue, entity::prelude::*};

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "actions_archive")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i64,
        pub admin_id: i64,
        pub customer_id: String,
        pub kind: String,
        pub payload: String,
        pub created_at: DateTimeUtc,
        pub reversed: bool,
        pub reversed_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}

    impl From<&super::Model> for ActiveModel {
        fn from(model: &super::Model) -> Self {
            Self {
                id: ActiveValue::Set(model.id),
                admin_id: ActiveValue::Set(model.admin_id),
                customer_id: ActiveValue::Set(model.customer_id.clone()),
                kind: ActiveValue::Set(model.kind.clone()),
                payload: ActiveValue::Set(model.payload.clone()),
                created_at: ActiveValue::Set(model.created_at),
                reversed: ActiveValue::Set(model.reversed),
                reversed_at: ActiveValue::Set(model.reversed_at),
            }
        }
    }
}
