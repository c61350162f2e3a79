use chrono::{DateTime, Utc};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, TransactionTrait, prelude::*,
};

use crate::{
    Action, LedgerError, ResultLedger, actions, actions::ActionPayload, customers, transactions,
};

use super::{Engine, with_tx};

/// Which logged action an undo request targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UndoTarget {
    /// The admin's most recent unreversed action.
    Last,
    /// A specific action by id. Later actions that depend on the undone
    /// state turn the request into a `Conflict`.
    Action(i64),
}

impl Engine {
    /// Computes and applies the inverse of a logged action.
    ///
    /// The inverse effect, the balance correction and the reversed flag
    /// commit in one database transaction; on any error nothing changes.
    /// Undo itself is never logged, so it cannot be undone.
    pub async fn undo(
        &self,
        admin_id: i64,
        target: UndoTarget,
        now: DateTime<Utc>,
    ) -> ResultLedger<Action> {
        let action = self.resolve_undo_target(admin_id, target).await?;
        let _guard = self.lock_customer(action.customer_id).await;

        with_tx!(self, |db_tx| {
            // Re-read under the customer lock: a racing undo may have won
            // between resolution and here.
            let model = actions::Entity::find_by_id(action.id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| LedgerError::NotFound("action".to_string()))?;
            if model.reversed {
                return Err(LedgerError::State(format!(
                    "action {} is already reversed",
                    action.id
                )));
            }
            let action = Action::try_from(model)?;

            self.apply_inverse(&db_tx, &action).await?;
            self.mark_reversed(&db_tx, action.id, now).await?;

            Ok(Action {
                reversed: true,
                reversed_at: Some(now),
                ..action
            })
        })
    }

    async fn resolve_undo_target(
        &self,
        admin_id: i64,
        target: UndoTarget,
    ) -> ResultLedger<Action> {
        match target {
            UndoTarget::Last => self
                .last_unreversed(admin_id)
                .await?
                .ok_or_else(|| LedgerError::NotFound("no action left to undo".to_string())),
            UndoTarget::Action(action_id) => {
                let model = actions::Entity::find_by_id(action_id)
                    .filter(actions::Column::AdminId.eq(admin_id))
                    .one(&self.database)
                    .await?
                    .ok_or_else(|| LedgerError::NotFound("action".to_string()))?;
                if model.reversed {
                    return Err(LedgerError::State(format!(
                        "action {action_id} is already reversed"
                    )));
                }
                Action::try_from(model)
            }
        }
    }

    async fn apply_inverse(
        &self,
        db_tx: &DatabaseTransaction,
        action: &Action,
    ) -> ResultLedger<()> {
        match &action.payload {
            ActionPayload::AddCustomer { .. } => self.inverse_add_customer(db_tx, action).await,
            ActionPayload::AddTransaction { transaction_id, .. }
            | ActionPayload::Settle { transaction_id, .. } => {
                self.inverse_add_transaction(db_tx, action, *transaction_id)
                    .await
            }
            ActionPayload::RenameCustomer { old_fullname } => {
                self.inverse_rename(db_tx, action, old_fullname).await
            }
            ActionPayload::ChangePhone { old_phone } => {
                self.inverse_change_phone(db_tx, action, old_phone).await
            }
            ActionPayload::DeleteCustomer {
                customer,
                transactions,
            } => {
                self.inverse_delete_customer(db_tx, action, customer, transactions)
                    .await
            }
        }
    }

    /// Inverse of `add_customer`: drop the customer again.
    ///
    /// Only valid while nothing else happened to the customer; any
    /// transaction or balance movement means later actions depend on it.
    async fn inverse_add_customer(
        &self,
        db_tx: &DatabaseTransaction,
        action: &Action,
    ) -> ResultLedger<()> {
        let model = self
            .require_live_customer(db_tx, action.admin_id, action.customer_id)
            .await?;

        let tx_count = transactions::Entity::find()
            .filter(transactions::Column::CustomerId.eq(action.customer_id.to_string()))
            .count(db_tx)
            .await?;
        if tx_count > 0 || model.balance_minor != 0 {
            return Err(LedgerError::Conflict(format!(
                "customer \"{}\" has transactions that depend on this action",
                model.fullname
            )));
        }

        customers::Entity::delete_by_id(action.customer_id.to_string())
            .exec(db_tx)
            .await?;
        Ok(())
    }

    /// Inverse of `add_transaction`/`settle`: remove the row and take its
    /// amount back out of the balance.
    async fn inverse_add_transaction(
        &self,
        db_tx: &DatabaseTransaction,
        action: &Action,
        transaction_id: Uuid,
    ) -> ResultLedger<()> {
        let customer_model = self
            .require_live_customer(db_tx, action.admin_id, action.customer_id)
            .await?;

        let tx_model = transactions::Entity::find_by_id(transaction_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| {
                LedgerError::Conflict("transaction no longer exists".to_string())
            })?;

        transactions::Entity::delete_by_id(transaction_id.to_string())
            .exec(db_tx)
            .await?;
        self.apply_balance_delta(db_tx, &customer_model, -tx_model.amount_minor)
            .await?;
        Ok(())
    }

    /// Inverse of `rename_customer`: put the old name back.
    async fn inverse_rename(
        &self,
        db_tx: &DatabaseTransaction,
        action: &Action,
        old_fullname: &str,
    ) -> ResultLedger<()> {
        self.require_live_customer(db_tx, action.admin_id, action.customer_id)
            .await?;

        let taken = customers::Entity::find()
            .filter(customers::Column::AdminId.eq(action.admin_id))
            .filter(customers::Column::Fullname.eq(old_fullname))
            .filter(customers::Column::Id.ne(action.customer_id.to_string()))
            .one(db_tx)
            .await?
            .is_some();
        if taken {
            return Err(LedgerError::Conflict(format!(
                "another customer is named \"{old_fullname}\" now"
            )));
        }

        let active = customers::ActiveModel {
            id: ActiveValue::Set(action.customer_id.to_string()),
            fullname: ActiveValue::Set(old_fullname.to_string()),
            ..Default::default()
        };
        active.update(db_tx).await?;
        Ok(())
    }

    /// Inverse of `change_phone`: put the old phone back.
    async fn inverse_change_phone(
        &self,
        db_tx: &DatabaseTransaction,
        action: &Action,
        old_phone: &str,
    ) -> ResultLedger<()> {
        self.require_live_customer(db_tx, action.admin_id, action.customer_id)
            .await?;

        let active = customers::ActiveModel {
            id: ActiveValue::Set(action.customer_id.to_string()),
            phone: ActiveValue::Set(old_phone.to_string()),
            ..Default::default()
        };
        active.update(db_tx).await?;
        Ok(())
    }

    /// Inverse of `delete_customer`: resurrect the snapshot verbatim,
    /// original ids and timestamps included.
    async fn inverse_delete_customer(
        &self,
        db_tx: &DatabaseTransaction,
        action: &Action,
        customer: &crate::Customer,
        snapshot: &[crate::Transaction],
    ) -> ResultLedger<()> {
        if customers::Entity::find_by_id(customer.id.to_string())
            .one(db_tx)
            .await?
            .is_some()
        {
            return Err(LedgerError::Conflict(
                "customer id is occupied again".to_string(),
            ));
        }
        let name_taken = customers::Entity::find()
            .filter(customers::Column::AdminId.eq(action.admin_id))
            .filter(customers::Column::Fullname.eq(customer.fullname.clone()))
            .one(db_tx)
            .await?
            .is_some();
        if name_taken {
            return Err(LedgerError::Conflict(format!(
                "another customer is named \"{}\" now",
                customer.fullname
            )));
        }

        customers::ActiveModel::from(customer).insert(db_tx).await?;
        for tx in snapshot {
            transactions::ActiveModel::from(tx).insert(db_tx).await?;
        }
        Ok(())
    }

    /// A customer an inverse wants to touch; absence is a `Conflict`, not
    /// a `NotFound`, because the action log says it was there.
    async fn require_live_customer(
        &self,
        db_tx: &DatabaseTransaction,
        admin_id: i64,
        customer_id: Uuid,
    ) -> ResultLedger<customers::Model> {
        customers::Entity::find_by_id(customer_id.to_string())
            .filter(customers::Column::AdminId.eq(admin_id))
            .one(db_tx)
            .await?
            .ok_or_else(|| LedgerError::Conflict("customer no longer exists".to_string()))
    }
}
