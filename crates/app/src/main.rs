use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde::Serialize;
use store::{MoneyCents, Store, TransactionFilter};
use uuid::Uuid;

mod settings;

type AppResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "spendwise")]
#[command(about = "Operator utilities for the Spendwise store")]
struct Cli {
    /// Overrides `database.url` from the settings.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending migrations and exit.
    Migrate,
    Categories(Categories),
    Accounts(Accounts),
    Transactions(Transactions),
}

#[derive(Args, Debug)]
struct Categories {
    #[command(subcommand)]
    command: CategoriesCommand,
}

#[derive(Subcommand, Debug)]
enum CategoriesCommand {
    /// Print the category tree, optionally below one category.
    Tree {
        #[arg(long)]
        root: Option<Uuid>,
        /// Defaults to `categories.max_tree_depth`.
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Score categorisation rules against a transaction description.
    Suggest {
        #[arg(long)]
        merchant: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Major units, `12.50` or `12,50`.
        #[arg(long)]
        amount: Option<MoneyCents>,
    },
}

#[derive(Args, Debug)]
struct Accounts {
    #[command(subcommand)]
    command: AccountsCommand,
}

#[derive(Subcommand, Debug)]
enum AccountsCommand {
    /// List linked accounts whose last sync is older than the staleness window.
    DueForSync,
}

#[derive(Args, Debug)]
struct Transactions {
    #[command(subcommand)]
    command: TransactionsCommand,
}

#[derive(Subcommand, Debug)]
enum TransactionsCommand {
    Stats {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    Duplicates {
        #[arg(long)]
        user: Option<Uuid>,
        #[arg(long)]
        account: Option<Uuid>,
    },
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect(url: &str, max_connections: u32) -> AppResult<DatabaseConnection> {
    let mut options = ConnectOptions::new(url.to_string());
    options.max_connections(max_connections).sqlx_logging(false);

    let database = Database::connect(options).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "spendwise={level},store={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database.url.clone());
    tracing::info!("connecting to database...");
    let database = connect(&url, settings.database.max_connections).await?;
    let store = Store::builder().database(database).build().await?;

    match cli.command {
        Command::Migrate => {
            tracing::info!("migrations applied");
        }
        Command::Categories(Categories { command }) => match command {
            CategoriesCommand::Tree { root, depth } => {
                let depth = depth.unwrap_or(settings.categories.max_tree_depth);
                let tree = store.categories().find_category_tree(root, depth).await?;
                print_json(&tree)?;
            }
            CategoriesCommand::Suggest {
                merchant,
                description,
                amount,
            } => {
                let amount = amount.map(MoneyCents::to_major);
                let categories = store.categories();
                let matches = categories
                    .find_matching_categories(merchant.as_deref(), description.as_deref(), amount)
                    .await?;
                let suggestion = categories
                    .suggest_category(merchant.as_deref(), description.as_deref(), amount)
                    .await?;
                print_json(&serde_json::json!({
                    "suggestion": suggestion,
                    "matches": matches,
                }))?;
            }
        },
        Command::Accounts(Accounts { command }) => match command {
            AccountsCommand::DueForSync => {
                let due = store
                    .accounts()
                    .find_needing_sync(&settings.sync_policy(), Utc::now())
                    .await?;
                tracing::info!(count = due.len(), "accounts due for sync");
                print_json(&due)?;
            }
        },
        Command::Transactions(Transactions { command }) => match command {
            TransactionsCommand::Stats { user, from, to } => {
                let stats = store.transactions().statistics(user, from, to).await?;
                print_json(&stats)?;
            }
            TransactionsCommand::Duplicates { user, account } => {
                let filter = TransactionFilter {
                    user_id: user,
                    account_id: account,
                    ..Default::default()
                };
                let groups = store
                    .transactions()
                    .find_duplicates(&filter, &settings.duplicate_criteria())
                    .await?;
                print_json(&groups)?;
            }
        },
    }

    Ok(())
}
