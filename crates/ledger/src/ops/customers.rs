use chrono::{DateTime, Utc};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, Condition, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
    TransactionTrait, prelude::*,
};

use crate::{
    Customer, LedgerError, ResultLedger, Transaction, TransactionKind, actions,
    actions::ActionPayload, customers, transactions, util,
};

use super::{Engine, with_tx};

/// How many transactions a summary shows.
const SUMMARY_RECENT_LIMIT: u64 = 5;

/// A search result row: just enough for a caller to present a pick list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerHit {
    pub id: Uuid,
    pub fullname: String,
}

/// Customer details plus lifetime totals and the latest transactions.
///
/// Both totals are magnitudes: `total_payments_minor` is how much the
/// customer has paid back, not the (negative) stored sum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomerSummary {
    pub customer: Customer,
    pub total_sales_minor: i64,
    pub total_payments_minor: i64,
    pub recent: Vec<Transaction>,
}

impl Engine {
    /// Creates a customer with a zero balance.
    ///
    /// The fullname is whitespace-collapsed and must stay non-empty; the
    /// phone is reduced to digits. Names are unique per admin.
    pub async fn add_customer(
        &self,
        admin_id: i64,
        fullname: &str,
        phone: &str,
        now: DateTime<Utc>,
    ) -> ResultLedger<Customer> {
        let fullname = util::normalize_fullname(fullname)?;
        let phone = util::normalize_phone(phone);

        with_tx!(self, |db_tx| {
            self.ensure_name_free(&db_tx, admin_id, &fullname, None)
                .await?;

            let customer = Customer::new(admin_id, fullname.clone(), phone.clone(), now);
            customers::ActiveModel::from(&customer).insert(&db_tx).await?;

            actions::active_for_insert(
                admin_id,
                customer.id,
                &ActionPayload::AddCustomer {
                    fullname,
                    phone,
                    created_at: now,
                },
                now,
            )?
            .insert(&db_tx)
            .await?;

            Ok(customer)
        })
    }

    /// Renames a customer, logging the old name for undo.
    pub async fn rename_customer(
        &self,
        admin_id: i64,
        customer_id: Uuid,
        new_fullname: &str,
        now: DateTime<Utc>,
    ) -> ResultLedger<Customer> {
        let new_fullname = util::normalize_fullname(new_fullname)?;
        let _guard = self.lock_customer(customer_id).await;

        with_tx!(self, |db_tx| {
            let model = self
                .require_customer(&db_tx, admin_id, customer_id)
                .await?;
            self.ensure_name_free(&db_tx, admin_id, &new_fullname, Some(customer_id))
                .await?;

            actions::active_for_insert(
                admin_id,
                customer_id,
                &ActionPayload::RenameCustomer {
                    old_fullname: model.fullname,
                },
                now,
            )?
            .insert(&db_tx)
            .await?;

            let active = customers::ActiveModel {
                id: ActiveValue::Set(customer_id.to_string()),
                fullname: ActiveValue::Set(new_fullname),
                ..Default::default()
            };
            let updated = active.update(&db_tx).await?;
            Customer::try_from(updated)
        })
    }

    /// Replaces a customer's phone, logging the old one for undo.
    pub async fn change_phone(
        &self,
        admin_id: i64,
        customer_id: Uuid,
        new_phone: &str,
        now: DateTime<Utc>,
    ) -> ResultLedger<Customer> {
        let new_phone = util::normalize_phone(new_phone);
        let _guard = self.lock_customer(customer_id).await;

        with_tx!(self, |db_tx| {
            let model = self
                .require_customer(&db_tx, admin_id, customer_id)
                .await?;

            actions::active_for_insert(
                admin_id,
                customer_id,
                &ActionPayload::ChangePhone {
                    old_phone: model.phone,
                },
                now,
            )?
            .insert(&db_tx)
            .await?;

            let active = customers::ActiveModel {
                id: ActiveValue::Set(customer_id.to_string()),
                phone: ActiveValue::Set(new_phone),
                ..Default::default()
            };
            let updated = active.update(&db_tx).await?;
            Customer::try_from(updated)
        })
    }

    /// Removes a customer whose balance is settled.
    ///
    /// The logged action snapshots the whole record and its transactions
    /// first, so an undo can resurrect everything verbatim.
    pub async fn delete_customer(
        &self,
        admin_id: i64,
        customer_id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultLedger<()> {
        let _guard = self.lock_customer(customer_id).await;

        with_tx!(self, |db_tx| {
            let model = self
                .require_customer(&db_tx, admin_id, customer_id)
                .await?;
            if model.balance_minor != 0 {
                return Err(LedgerError::Precondition(format!(
                    "customer \"{}\" still has an open balance",
                    model.fullname
                )));
            }
            let customer = Customer::try_from(model)?;

            let tx_models = transactions::Entity::find()
                .filter(transactions::Column::CustomerId.eq(customer_id.to_string()))
                .order_by_asc(transactions::Column::CreatedAt)
                .order_by_asc(transactions::Column::Id)
                .all(&db_tx)
                .await?;
            let mut snapshot = Vec::with_capacity(tx_models.len());
            for tx_model in tx_models {
                snapshot.push(Transaction::try_from(tx_model)?);
            }

            actions::active_for_insert(
                admin_id,
                customer_id,
                &ActionPayload::DeleteCustomer {
                    customer,
                    transactions: snapshot,
                },
                now,
            )?
            .insert(&db_tx)
            .await?;

            transactions::Entity::delete_many()
                .filter(transactions::Column::CustomerId.eq(customer_id.to_string()))
                .exec(&db_tx)
                .await?;
            customers::Entity::delete_by_id(customer_id.to_string())
                .exec(&db_tx)
                .await?;

            Ok(())
        })
    }

    /// Returns a customer by id.
    pub async fn customer(&self, admin_id: i64, customer_id: Uuid) -> ResultLedger<Customer> {
        let model = self
            .require_customer(&self.database, admin_id, customer_id)
            .await?;
        Customer::try_from(model)
    }

    /// Substring search over fullname and phone, ordered by fullname.
    ///
    /// An empty query lists all of the admin's customers up to `limit`.
    pub async fn search_customers(
        &self,
        admin_id: i64,
        query: &str,
        limit: u64,
    ) -> ResultLedger<Vec<CustomerHit>> {
        let query = util::normalize_query(query);

        let mut find = customers::Entity::find().filter(customers::Column::AdminId.eq(admin_id));
        if !query.is_empty() {
            find = find.filter(
                Condition::any()
                    .add(customers::Column::Fullname.contains(&query))
                    .add(customers::Column::Phone.contains(&query)),
            );
        }
        let models = find
            .order_by_asc(customers::Column::Fullname)
            .limit(limit)
            .all(&self.database)
            .await?;

        models
            .into_iter()
            .map(|model| {
                Ok(CustomerHit {
                    id: util::parse_uuid(&model.id, "customer")?,
                    fullname: model.fullname,
                })
            })
            .collect()
    }

    /// Returns the customer with sale/payment totals and the most recent
    /// transactions (newest first).
    pub async fn customer_summary(
        &self,
        admin_id: i64,
        customer_id: Uuid,
    ) -> ResultLedger<CustomerSummary> {
        let model = self
            .require_customer(&self.database, admin_id, customer_id)
            .await?;
        let customer = Customer::try_from(model)?;

        let total_sales_minor = self
            .sum_transactions(customer_id, TransactionKind::Sale)
            .await?;
        let total_payments_minor = -self
            .sum_transactions(customer_id, TransactionKind::Payment)
            .await?;

        let recent_models = transactions::Entity::find()
            .filter(transactions::Column::CustomerId.eq(customer_id.to_string()))
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_desc(transactions::Column::Id)
            .limit(SUMMARY_RECENT_LIMIT)
            .all(&self.database)
            .await?;
        let mut recent = Vec::with_capacity(recent_models.len());
        for tx_model in recent_models {
            recent.push(Transaction::try_from(tx_model)?);
        }

        Ok(CustomerSummary {
            customer,
            total_sales_minor,
            total_payments_minor,
            recent,
        })
    }

    async fn sum_transactions(
        &self,
        customer_id: Uuid,
        kind: TransactionKind,
    ) -> ResultLedger<i64> {
        let backend = self.database.get_database_backend();
        let stmt = Statement::from_sql_and_values(
            backend,
            "SELECT COALESCE(SUM(amount_minor), 0) AS sum \
             FROM transactions \
             WHERE customer_id = ? AND kind = ?",
            [customer_id.to_string().into(), kind.as_str().into()],
        );
        let row = self.database.query_one(stmt).await?;
        Ok(row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0))
    }

    pub(crate) async fn require_customer<C>(
        &self,
        conn: &C,
        admin_id: i64,
        customer_id: Uuid,
    ) -> ResultLedger<customers::Model>
    where
        C: ConnectionTrait,
    {
        customers::Entity::find_by_id(customer_id.to_string())
            .filter(customers::Column::AdminId.eq(admin_id))
            .one(conn)
            .await?
            .ok_or_else(|| LedgerError::NotFound("customer".to_string()))
    }

    async fn ensure_name_free<C>(
        &self,
        conn: &C,
        admin_id: i64,
        fullname: &str,
        exclude: Option<Uuid>,
    ) -> ResultLedger<()>
    where
        C: ConnectionTrait,
    {
        let mut find = customers::Entity::find()
            .filter(customers::Column::AdminId.eq(admin_id))
            .filter(customers::Column::Fullname.eq(fullname));
        if let Some(id) = exclude {
            find = find.filter(customers::Column::Id.ne(id.to_string()));
        }
        if find.one(conn).await?.is_some() {
            return Err(LedgerError::Validation(format!(
                "customer named \"{fullname}\" already exists"
            )));
        }
        Ok(())
    }
}
