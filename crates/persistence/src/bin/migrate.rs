#![deny(warnings)]

use persistence::{default_sqlite_url, SqliteStore, WorldSnapshot};
use tracing_subscriber::EnvFilter;

/// `migrate [DATABASE_URL] [SNAPSHOT.yaml]`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| default_sqlite_url().to_string());
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"));
    if let Some(path) = path.filter(|p| !p.contains(":memory:")) {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let store = SqliteStore::connect(&url).await?;
    tracing::info!(%url, "database migrated");

    if let Some(snapshot) = args.next() {
        let snapshot = WorldSnapshot::load(&snapshot)?;
        store.import_snapshot(&snapshot).await?;
        println!("Imported world {} into {}", snapshot.world.id, url);
    } else {
        println!("DB migrated at {}", url);
    }
    Ok(())
}
