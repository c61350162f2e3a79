use chrono::{DateTime, Utc};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};

use crate::{
    LedgerError, ResultLedger, Transaction, actions, actions::ActionPayload, customers,
    transactions,
};

use super::{Engine, with_tx};

impl Engine {
    /// Records a transaction against a customer's balance.
    ///
    /// The amount is signed: positive for new debt, negative for a
    /// repayment. A zero amount is rejected. The balance update, the
    /// transaction row and the history append commit together.
    pub async fn add_transaction(
        &self,
        admin_id: i64,
        customer_id: Uuid,
        amount_minor: i64,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> ResultLedger<Transaction> {
        let _guard = self.lock_customer(customer_id).await;

        with_tx!(self, |db_tx| {
            let tx = self
                .create_transaction(&db_tx, admin_id, customer_id, amount_minor, description, now)
                .await?;

            actions::active_for_insert(
                admin_id,
                customer_id,
                &ActionPayload::AddTransaction {
                    transaction_id: tx.id,
                    amount_minor: tx.amount_minor,
                    description: tx.description.clone(),
                    created_at: now,
                },
                now,
            )?
            .insert(&db_tx)
            .await?;

            Ok(tx)
        })
    }

    /// Records a settlement: the customer pays back `amount_minor`.
    ///
    /// Thin policy wrapper over the transaction primitive with the
    /// negative-amount convention, logged under its own action kind so
    /// history and undo can tell payments from sales.
    pub async fn settle(
        &self,
        admin_id: i64,
        customer_id: Uuid,
        amount_minor: i64,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> ResultLedger<Transaction> {
        if amount_minor == 0 {
            return Err(LedgerError::Validation(
                "amount_minor must not be 0".to_string(),
            ));
        }
        let amount_minor = -amount_minor.abs();
        let _guard = self.lock_customer(customer_id).await;

        with_tx!(self, |db_tx| {
            let tx = self
                .create_transaction(&db_tx, admin_id, customer_id, amount_minor, description, now)
                .await?;

            actions::active_for_insert(
                admin_id,
                customer_id,
                &ActionPayload::Settle {
                    transaction_id: tx.id,
                    amount_minor: tx.amount_minor,
                    description: tx.description.clone(),
                    created_at: now,
                },
                now,
            )?
            .insert(&db_tx)
            .await?;

            Ok(tx)
        })
    }

    /// Lists a customer's transactions, oldest first. No side effects.
    pub async fn list_history(
        &self,
        admin_id: i64,
        customer_id: Uuid,
    ) -> ResultLedger<Vec<Transaction>> {
        self.require_customer(&self.database, admin_id, customer_id)
            .await?;

        let models = transactions::Entity::find()
            .filter(transactions::Column::CustomerId.eq(customer_id.to_string()))
            .order_by_asc(transactions::Column::CreatedAt)
            .order_by_asc(transactions::Column::Id)
            .all(&self.database)
            .await?;

        let mut out = Vec::with_capacity(models.len());
        for model in models {
            out.push(Transaction::try_from(model)?);
        }
        Ok(out)
    }

    /// Inserts the transaction row and moves the balance with it.
    async fn create_transaction(
        &self,
        db_tx: &DatabaseTransaction,
        admin_id: i64,
        customer_id: Uuid,
        amount_minor: i64,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> ResultLedger<Transaction> {
        let customer_model = self.require_customer(db_tx, admin_id, customer_id).await?;

        let tx = Transaction::new(
            customer_id,
            admin_id,
            amount_minor,
            description.map(str::trim).filter(|s| !s.is_empty()).map(ToString::to_string),
            now,
        )?;
        transactions::ActiveModel::from(&tx).insert(db_tx).await?;

        self.apply_balance_delta(db_tx, &customer_model, amount_minor)
            .await?;

        Ok(tx)
    }

    /// Persists `balance + delta` for the given customer row.
    pub(in crate::ops) async fn apply_balance_delta(
        &self,
        db_tx: &DatabaseTransaction,
        customer_model: &customers::Model,
        delta_minor: i64,
    ) -> ResultLedger<()> {
        let new_balance = customer_model
            .balance_minor
            .checked_add(delta_minor)
            .ok_or_else(|| {
                LedgerError::Validation("balance overflows minor units".to_string())
            })?;
        let active = customers::ActiveModel {
            id: ActiveValue::Set(customer_model.id.clone()),
            balance_minor: ActiveValue::Set(new_balance),
            ..Default::default()
        };
        active.update(db_tx).await?;
        Ok(())
    }
}
