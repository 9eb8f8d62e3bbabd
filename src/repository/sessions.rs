//! Sessions table
//!
//! Only the SHA-256 of a bearer token is stored.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::{Principal, Role};

use super::{RepositoryError, RepositoryResult};

pub async fn insert(
    conn: &mut PgConnection,
    token_hash: &str,
    principal: Principal,
    expires_at: DateTime<Utc>,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (token_hash, user_id, role, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(token_hash)
    .bind(principal.user_id)
    .bind(principal.role.as_str())
    .bind(expires_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Resolve an unexpired session to its principal
pub async fn resolve(conn: &mut PgConnection, token_hash: &str, now: DateTime<Utc>) -> RepositoryResult<Option<Principal>> {
    let row: Option<(Uuid, String)> = sqlx::query_as(
        r#"
        SELECT user_id, role
        FROM sessions
        WHERE token_hash = $1 AND expires_at > $2
        "#,
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|(user_id, role)| {
        role.parse::<Role>()
            .map(|role| Principal::new(user_id, role))
            .map_err(RepositoryError::corrupt)
    })
    .transpose()
}

pub async fn delete(conn: &mut PgConnection, token_hash: &str) -> RepositoryResult<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
        .bind(token_hash)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Drop every session of a user (after a password reset)
pub async fn delete_for_user(conn: &mut PgConnection, user_id: Uuid) -> RepositoryResult<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
