// src/database.rs
use std::time::Duration;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Exclusive month lock, held until the transaction ends. Closing and reopening a month take it.
pub async fn lock_month(
    conn: &mut sqlx::PgConnection,
    month: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext('financial_month:' || $1))")
        .bind(month)
        .execute(conn)
        .await?;
    Ok(())
}

/// Shared form of the same key. Ledger writers hold it together, so sales in one month
/// do not queue behind each other, but a close or reopen waits for all of them.
pub async fn lock_month_shared(
    conn: &mut sqlx::PgConnection,
    month: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock_shared(hashtext('financial_month:' || $1))")
        .bind(month)
        .execute(conn)
        .await?;
    Ok(())
}
