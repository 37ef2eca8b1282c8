use migration::{Migrator, MigratorTrait};
use sea_orm::Database;

const DEFAULT_DATABASE_URL: &str = "sqlite:./spendwise.db?mode=rwc";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "up".to_string());
    // Optional step count for `up` and `down`; all pending/applied when absent.
    let steps = args.next().map(|raw| raw.parse::<u32>()).transpose()?;

    let db_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let db = Database::connect(&db_url).await?;

    match command.as_str() {
        "up" => Migrator::up(&db, steps).await?,
        "down" => Migrator::down(&db, steps).await?,
        "fresh" => Migrator::fresh(&db).await?,
        "status" => Migrator::status(&db).await?,
        _ => {
            eprintln!("Usage: cargo run -p migration -- [up|down|fresh|status] [steps]");
            std::process::exit(2);
        }
    }

    Ok(())
}
