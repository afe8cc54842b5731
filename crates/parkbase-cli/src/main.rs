mod data;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::data::DataCommands;

#[derive(Debug, Parser)]
#[command(name = "parkbase-cli")]
#[command(about = "Parkbase command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Bulk listing data management
    Data {
        #[command(subcommand)]
        command: DataCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("parkbase-cli: run with --help to list commands");
        return Ok(());
    };

    let config = parkbase_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool = parkbase_db::connect_pool_from_config(&config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            parkbase_db::health_check(&pool).await?;
            println!("database: ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = parkbase_db::run_migrations(&pool).await?;
            println!("migrations applied: {applied}");
        }
        Commands::Data { command } => data::run(pool, command).await?,
    }

    Ok(())
}
