//! Migration runner: `migrate apply [IDS..]`, `migrate rollback [IDS..]`, `migrate status`.

use clap::{Parser, Subcommand};
use products_api::{connect_pool, ensure_database_exists, load_dotenv, Migrator, Settings};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "migrate", about = "Apply or revert the products database schema")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations, all of them or only the given ids.
    Apply { ids: Vec<String> },
    /// Revert applied migrations in reverse order, all of them or only the given ids.
    Rollback { ids: Vec<String> },
    /// List known migrations and when each was applied.
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv(&std::env::current_dir()?);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("products_api=info".parse()?))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    ensure_database_exists(&settings.db).await?;
    let pool = connect_pool(&settings.db).await?;
    let migrator = Migrator::default();

    match cli.command {
        Command::Apply { ids } => {
            let done = migrator.apply(&pool, Some(ids.as_slice())).await?;
            println!("applied: {}", if done.is_empty() { "nothing".to_string() } else { done.join(", ") });
        }
        Command::Rollback { ids } => {
            let done = migrator.rollback(&pool, Some(ids.as_slice())).await?;
            println!("rolled back: {}", if done.is_empty() { "nothing".to_string() } else { done.join(", ") });
        }
        Command::Status => {
            for m in migrator.status(&pool).await? {
                match m.applied_at {
                    Some(at) => println!("{}  applied {}", m.id, at.to_rfc3339()),
                    None => println!("{}  pending", m.id),
                }
            }
        }
    }
    pool.close().await;
    Ok(())
}
