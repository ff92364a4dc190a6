use anyhow::{Context, Result};
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use std::time::Duration;
use tracing::info;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Build the bounded connection pool shared by every repository. Store
/// writes are serialized per connection; the pool caps concurrent database
/// work so a slow store cycle cannot pile up connections.
pub fn create_pool(database_url: &str) -> Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(8)
        .connection_timeout(Duration::from_secs(5))
        .build(manager)
        .context("failed to create database connection pool")?;
    info!("Database pool created (max 8 connections)");
    Ok(pool)
}
