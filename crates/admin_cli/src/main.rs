use std::error::Error;

use chrono::{Duration, Utc};
use clap::{Args, Parser, Subcommand};
use ledger::{Action, Customer, Engine, Transaction, UndoTarget};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "paytrack_admin")]
#[command(about = "Admin utilities for PayTrack (customers, ledger, history, undo)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./paytrack.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Customer(CustomerCmd),
    Tx(TxCmd),
    Actions(ActionsCmd),
    /// Undo the admin's last action, or a specific one by id.
    Undo(UndoArgs),
}

#[derive(Args, Debug)]
struct CustomerCmd {
    #[command(subcommand)]
    command: CustomerCommand,
}

#[derive(Subcommand, Debug)]
enum CustomerCommand {
    /// Create a customer with a zero balance.
    Add {
        #[arg(long)]
        admin: i64,
        #[arg(long)]
        fullname: String,
        #[arg(long, default_value = "")]
        phone: String,
    },
    /// Rename a customer.
    Rename {
        #[arg(long)]
        admin: i64,
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        fullname: String,
    },
    /// Replace a customer's phone number.
    ChangePhone {
        #[arg(long)]
        admin: i64,
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        phone: String,
    },
    /// Delete a customer (balance must be settled).
    Delete {
        #[arg(long)]
        admin: i64,
        #[arg(long)]
        id: Uuid,
    },
    /// Show one customer.
    Show {
        #[arg(long)]
        admin: i64,
        #[arg(long)]
        id: Uuid,
    },
    /// Substring search over names and phones.
    Search {
        #[arg(long)]
        admin: i64,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: u64,
    },
    /// Totals and recent transactions for one customer.
    Summary {
        #[arg(long)]
        admin: i64,
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Args, Debug)]
struct TxCmd {
    #[command(subcommand)]
    command: TxCommand,
}

#[derive(Subcommand, Debug)]
enum TxCommand {
    /// Record a transaction; positive minor units add debt, negative settle it.
    Add {
        #[arg(long)]
        admin: i64,
        #[arg(long)]
        customer: Uuid,
        /// Signed amount in minor units (e.g. 1050 = 10.50).
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        description: Option<String>,
    },
    /// Record a payment that reduces the customer's debt.
    Settle {
        #[arg(long)]
        admin: i64,
        #[arg(long)]
        customer: Uuid,
        /// Amount paid back in minor units; the sign is ignored.
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        description: Option<String>,
    },
    /// List a customer's transactions, oldest first.
    History {
        #[arg(long)]
        admin: i64,
        #[arg(long)]
        customer: Uuid,
    },
}

#[derive(Args, Debug)]
struct ActionsCmd {
    #[command(subcommand)]
    command: ActionsCommand,
}

#[derive(Subcommand, Debug)]
enum ActionsCommand {
    /// List the admin's latest actions, newest first.
    Recent {
        #[arg(long)]
        admin: i64,
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },
    /// Move actions older than the given number of days into the archive.
    Archive {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[derive(Args, Debug)]
struct UndoArgs {
    #[arg(long)]
    admin: i64,
    /// Target action id; defaults to the admin's most recent action.
    #[arg(long)]
    action: Option<i64>,
}

fn format_minor(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

fn print_customer(customer: &Customer) {
    println!(
        "{}  {}  phone={}  balance={}  since={}",
        customer.id,
        customer.fullname,
        if customer.phone.is_empty() {
            "-"
        } else {
            customer.phone.as_str()
        },
        format_minor(customer.balance_minor),
        customer.created_at.format("%Y-%m-%d"),
    );
}

fn print_transaction(tx: &Transaction) {
    println!(
        "{}  {}  {}  {}  {}",
        tx.id,
        tx.created_at.format("%Y-%m-%d %H:%M"),
        tx.kind.as_str(),
        format_minor(tx.amount_minor),
        tx.description.as_deref().unwrap_or("-"),
    );
}

fn print_action(action: &Action) {
    println!(
        "#{}  {}  {}  customer={}  {}",
        action.id,
        action.created_at.format("%Y-%m-%d %H:%M"),
        action.kind.as_str(),
        action.customer_id,
        if action.reversed { "reversed" } else { "active" },
    );
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "paytrack_admin=info,ledger=info".to_string()),
        )
        .init();

    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    tracing::debug!("database ready at {}", cli.database_url);
    let engine = Engine::builder().database(db).build().await?;
    let now = Utc::now();

    match cli.command {
        Command::Customer(CustomerCmd { command }) => match command {
            CustomerCommand::Add {
                admin,
                fullname,
                phone,
            } => {
                let customer = engine.add_customer(admin, &fullname, &phone, now).await?;
                print_customer(&customer);
            }
            CustomerCommand::Rename {
                admin,
                id,
                fullname,
            } => {
                let customer = engine.rename_customer(admin, id, &fullname, now).await?;
                print_customer(&customer);
            }
            CustomerCommand::ChangePhone { admin, id, phone } => {
                let customer = engine.change_phone(admin, id, &phone, now).await?;
                print_customer(&customer);
            }
            CustomerCommand::Delete { admin, id } => {
                engine.delete_customer(admin, id, now).await?;
                println!("deleted customer {id}");
            }
            CustomerCommand::Show { admin, id } => {
                let customer = engine.customer(admin, id).await?;
                print_customer(&customer);
            }
            CustomerCommand::Search {
                admin,
                query,
                limit,
            } => {
                let hits = engine.search_customers(admin, &query, limit).await?;
                if hits.is_empty() {
                    println!("no customers found");
                }
                for hit in hits {
                    println!("{}  {}", hit.id, hit.fullname);
                }
            }
            CustomerCommand::Summary { admin, id } => {
                let summary = engine.customer_summary(admin, id).await?;
                print_customer(&summary.customer);
                println!(
                    "sales={}  payments={}",
                    format_minor(summary.total_sales_minor),
                    format_minor(summary.total_payments_minor),
                );
                for tx in &summary.recent {
                    print_transaction(tx);
                }
            }
        },
        Command::Tx(TxCmd { command }) => match command {
            TxCommand::Add {
                admin,
                customer,
                amount,
                description,
            } => {
                let tx = engine
                    .add_transaction(admin, customer, amount, description.as_deref(), now)
                    .await?;
                print_transaction(&tx);
            }
            TxCommand::Settle {
                admin,
                customer,
                amount,
                description,
            } => {
                let tx = engine
                    .settle(admin, customer, amount, description.as_deref(), now)
                    .await?;
                print_transaction(&tx);
            }
            TxCommand::History { admin, customer } => {
                for tx in engine.list_history(admin, customer).await? {
                    print_transaction(&tx);
                }
            }
        },
        Command::Actions(ActionsCmd { command }) => match command {
            ActionsCommand::Recent { admin, limit } => {
                for action in engine.list_recent_actions(admin, limit).await? {
                    print_action(&action);
                }
            }
            ActionsCommand::Archive { days } => {
                let cutoff = now - Duration::days(days);
                let moved = engine.archive_actions(cutoff).await?;
                println!("archived {moved} actions");
            }
        },
        Command::Undo(UndoArgs { admin, action }) => {
            let target = match action {
                Some(id) => UndoTarget::Action(id),
                None => UndoTarget::Last,
            };
            let reversed = engine.undo(admin, target, now).await?;
            println!("undo complete:");
            print_action(&reversed);
        }
    }

    Ok(())
}
