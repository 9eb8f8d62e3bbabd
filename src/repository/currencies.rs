//! Currencies table

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use super::RepositoryResult;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub id: Uuid,
    pub name: String,
    pub wallet_address: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn list(conn: &mut PgConnection) -> RepositoryResult<Vec<Currency>> {
    let currencies = sqlx::query_as(
        r#"
        SELECT id, name, wallet_address, active, created_at, updated_at
        FROM currencies
        ORDER BY name
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(currencies)
}

pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> RepositoryResult<Option<Currency>> {
    let currency = sqlx::query_as(
        r#"
        SELECT id, name, wallet_address, active, created_at, updated_at
        FROM currencies
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(currency)
}

pub async fn find_by_name(conn: &mut PgConnection, name: &str) -> RepositoryResult<Option<Currency>> {
    let currency = sqlx::query_as(
        r#"
        SELECT id, name, wallet_address, active, created_at, updated_at
        FROM currencies
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(currency)
}

pub async fn insert(conn: &mut PgConnection, name: &str, wallet_address: &str) -> RepositoryResult<Currency> {
    let currency = sqlx::query_as(
        r#"
        INSERT INTO currencies (id, name, wallet_address, active)
        VALUES ($1, $2, $3, TRUE)
        RETURNING id, name, wallet_address, active, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(wallet_address)
    .fetch_one(&mut *conn)
    .await?;
    Ok(currency)
}

/// Patch the mutable fields, leaving `None` fields untouched
pub async fn update(
    conn: &mut PgConnection,
    id: Uuid,
    wallet_address: Option<&str>,
    active: Option<bool>,
) -> RepositoryResult<Option<Currency>> {
    let currency = sqlx::query_as(
        r#"
        UPDATE currencies SET
            wallet_address = COALESCE($2, wallet_address),
            active = COALESCE($3, active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, name, wallet_address, active, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(wallet_address)
    .bind(active)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(currency)
}
