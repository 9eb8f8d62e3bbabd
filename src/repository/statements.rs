//! Statements table (requests only, reports are computed on read)

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::statement::Statement;

use super::{RepositoryError, RepositoryResult};

#[derive(Debug, sqlx::FromRow)]
struct StatementRow {
    id: Uuid,
    user_id: Uuid,
    account_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    format: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<StatementRow> for Statement {
    type Error = RepositoryError;

    fn try_from(row: StatementRow) -> Result<Self, Self::Error> {
        Ok(Statement {
            id: row.id,
            user_id: row.user_id,
            account_type: row.account_type.parse().map_err(RepositoryError::corrupt)?,
            start_date: row.start_date,
            end_date: row.end_date,
            format: row.format.parse().map_err(RepositoryError::corrupt)?,
            created_at: row.created_at,
        })
    }
}

pub async fn insert(conn: &mut PgConnection, statement: &Statement) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO statements (id, user_id, account_type, start_date, end_date, format, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(statement.id)
    .bind(statement.user_id)
    .bind(statement.account_type.as_str())
    .bind(statement.start_date)
    .bind(statement.end_date)
    .bind(statement.format.as_str())
    .bind(statement.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> RepositoryResult<Option<Statement>> {
    let row: Option<StatementRow> = sqlx::query_as(
        r#"
        SELECT id, user_id, account_type, start_date, end_date, format, created_at
        FROM statements
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(Statement::try_from).transpose()
}

/// `user_id = None` lists every user's statements
pub async fn list(conn: &mut PgConnection, user_id: Option<Uuid>) -> RepositoryResult<Vec<Statement>> {
    let rows: Vec<StatementRow> = sqlx::query_as(
        r#"
        SELECT id, user_id, account_type, start_date, end_date, format, created_at
        FROM statements
        WHERE $1::uuid IS NULL OR user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    rows.into_iter().map(Statement::try_from).collect()
}
