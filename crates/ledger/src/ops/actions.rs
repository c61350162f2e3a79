use chrono::{DateTime, Utc};

use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};

use crate::{Action, LedgerError, ResultLedger, actions};

use super::{Engine, with_tx};

impl Engine {
    /// Returns the admin's most recent action that has not been undone.
    ///
    /// Undo is scoped per admin: one admin's `/undo` never touches what
    /// another admin did.
    pub async fn last_unreversed(&self, admin_id: i64) -> ResultLedger<Option<Action>> {
        let model = actions::Entity::find()
            .filter(actions::Column::AdminId.eq(admin_id))
            .filter(actions::Column::Reversed.eq(false))
            .order_by_desc(actions::Column::CreatedAt)
            .order_by_desc(actions::Column::Id)
            .one(&self.database)
            .await?;
        model.map(Action::try_from).transpose()
    }

    /// Lists the admin's latest actions, newest first, at most `limit`.
    pub async fn list_recent_actions(
        &self,
        admin_id: i64,
        limit: u64,
    ) -> ResultLedger<Vec<Action>> {
        let models = actions::Entity::find()
            .filter(actions::Column::AdminId.eq(admin_id))
            .order_by_desc(actions::Column::CreatedAt)
            .order_by_desc(actions::Column::Id)
            .limit(limit)
            .all(&self.database)
            .await?;

        let mut out = Vec::with_capacity(models.len());
        for model in models {
            out.push(Action::try_from(model)?);
        }
        Ok(out)
    }

    /// Moves actions created before `older_than` into the archive table.
    ///
    /// Returns how many rows were moved. Reversal state travels with the
    /// row, so an archived action stays non-undoable.
    pub async fn archive_actions(&self, older_than: DateTime<Utc>) -> ResultLedger<u64> {
        with_tx!(self, |db_tx| {
            let old = actions::Entity::find()
                .filter(actions::Column::CreatedAt.lt(older_than))
                .all(&db_tx)
                .await?;

            let count = old.len() as u64;
            if !old.is_empty() {
                let rows: Vec<actions::archive::ActiveModel> =
                    old.iter().map(actions::archive::ActiveModel::from).collect();
                actions::archive::Entity::insert_many(rows).exec(&db_tx).await?;
                actions::Entity::delete_many()
                    .filter(actions::Column::CreatedAt.lt(older_than))
                    .exec(&db_tx)
                    .await?;
            }
            Ok(count)
        })
    }

    /// Flips the reversed flag; only the undo path may call this, right
    /// after applying the inverse in the same transaction.
    pub(crate) async fn mark_reversed(
        &self,
        db_tx: &DatabaseTransaction,
        action_id: i64,
        now: DateTime<Utc>,
    ) -> ResultLedger<()> {
        let model = actions::Entity::find_by_id(action_id)
            .one(db_tx)
            .await?
            .ok_or_else(|| LedgerError::State(format!("action {action_id} does not exist")))?;
        if model.reversed {
            return Err(LedgerError::State(format!(
                "action {action_id} is already reversed"
            )));
        }

        let active = actions::ActiveModel {
            id: ActiveValue::Set(action_id),
            reversed: ActiveValue::Set(true),
            reversed_at: ActiveValue::Set(Some(now)),
            ..Default::default()
        };
        active.update(db_tx).await?;
        Ok(())
    }
}
