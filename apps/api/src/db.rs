use anyhow::{bail, Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Tables the binder service reads and writes. Created by `migrations/0001_binder.sql`.
const REQUIRED_TABLES: &[&str] = &["rhymes", "binder_selections"];

/// Creates a PostgreSQL connection pool and checks the binder schema is in place.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    verify_schema(&pool).await?;
    info!("PostgreSQL connection pool established");
    Ok(pool)
}

async fn verify_schema(pool: &PgPool) -> Result<()> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(format!("public.{table}"))
            .fetch_one(pool)
            .await
            .with_context(|| format!("Failed to inspect table '{table}'"))?;
        if !exists {
            bail!("Table '{table}' is missing; apply migrations/0001_binder.sql");
        }
    }
    Ok(())
}
