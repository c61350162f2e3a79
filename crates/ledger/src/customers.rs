//! Customer primitives.
//!
//! A `Customer` carries a running balance in signed minor units. The
//! balance always equals the sum of the customer's live transaction
//! amounts; the ops layer keeps the two in step inside one database
//! transaction.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LedgerError, util};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub admin_id: i64,
    pub fullname: String,
    pub phone: String,
    pub balance_minor: i64,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(admin_id: i64, fullname: String, phone: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            admin_id,
            fullname,
            phone,
            balance_minor: 0,
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub admin_id: i64,
    pub fullname: String,
    pub phone: String,
    pub balance_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Customer> for ActiveModel {
    fn from(customer: &Customer) -> Self {
        Self {
            id: ActiveValue::Set(customer.id.to_string()),
            admin_id: ActiveValue::Set(customer.admin_id),
            fullname: ActiveValue::Set(customer.fullname.clone()),
            phone: ActiveValue::Set(customer.phone.clone()),
            balance_minor: ActiveValue::Set(customer.balance_minor),
            created_at: ActiveValue::Set(customer.created_at),
        }
    }
}

impl TryFrom<Model> for Customer {
    type Error = LedgerError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: util::parse_uuid(&model.id, "customer")?,
            admin_id: model.admin_id,
            fullname: model.fullname,
            phone: model.phone,
            balance_minor: model.balance_minor,
            created_at: model.created_at,
        })
    }
}
