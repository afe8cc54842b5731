//! Bulk listing commands. Every write goes through the lifecycle engine, so
//! imported listings are validated and derived exactly like API writes.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;
use parkbase_db::{Listings, PgStore};

#[derive(Debug, Subcommand)]
pub enum DataCommands {
    /// Create listings from a JSON array of listing payloads
    Import {
        /// Path to the JSON seed file
        file: PathBuf,
    },
    /// Delete every listing
    Purge {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },
}

fn engine(pool: sqlx::PgPool) -> Listings {
    let store = Arc::new(PgStore::new(pool));
    Listings::new(store.clone(), store.clone(), store)
}

/// # Errors
///
/// Returns an error if the seed file cannot be read or parsed, or if any
/// listing fails validation or cannot be written. Import stops at the first
/// failure; listings created before it are kept.
pub(crate) async fn run(pool: sqlx::PgPool, command: DataCommands) -> anyhow::Result<()> {
    let listings = engine(pool);
    match command {
        DataCommands::Import { file } => {
            let inputs = parkbase_core::seed::load_seed_file(&file)?;
            let total = inputs.len();
            let created = listings.import(inputs).await?;
            tracing::info!(created, total, file = %file.display(), "listings imported");
            println!("imported {created} of {total} listings");
        }
        DataCommands::Purge { yes } => {
            if !yes {
                anyhow::bail!("refusing to delete every listing without --yes");
            }
            let removed = listings.purge().await?;
            println!("deleted {removed} listings");
        }
    }
    Ok(())
}
