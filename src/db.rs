//! Database module
//!
//! Connectivity and schema checks run at startup.

use sqlx::PgPool;

/// Tables created by `migrations/0001_init.sql`
const REQUIRED_TABLES: &[&str] = &[
    "users",
    "sessions",
    "currencies",
    "loans",
    "transactions",
    "statements",
    "notifications",
];

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    let active_currencies: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM currencies WHERE active")
        .fetch_one(pool)
        .await?;
    if active_currencies == 0 {
        tracing::warn!("No active currencies configured; transactions will be rejected until one is created");
    }

    Ok(true)
}
