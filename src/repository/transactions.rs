//! Transactions table

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::aggregate::Transaction;
use crate::domain::{AccountType, Amount, ChequeDetails, CryptoDetails, TransferDetails, CREDIT_LIMIT_INCREASE};

use super::{RepositoryError, RepositoryResult};

macro_rules! select_transaction {
    ($clause:literal) => {
        concat!(
            "SELECT id, user_id, transaction_type, amount, currency, account_type, status, ",
            "recipient, payment_method, notes, loan_type, loan_id, ",
            "cheque_details, crypto_details, transfer_details, created_at, updated_at ",
            "FROM transactions ",
            $clause
        )
    };
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    transaction_type: String,
    amount: Decimal,
    currency: String,
    account_type: String,
    status: String,
    recipient: Option<String>,
    payment_method: Option<String>,
    notes: Option<String>,
    loan_type: Option<String>,
    loan_id: Option<Uuid>,
    cheque_details: Option<Json<ChequeDetails>>,
    crypto_details: Option<Json<CryptoDetails>>,
    transfer_details: Option<Json<TransferDetails>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = RepositoryError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            user_id: row.user_id,
            transaction_type: row.transaction_type.parse().map_err(RepositoryError::corrupt)?,
            amount: Amount::new(row.amount)
                .map_err(|e| RepositoryError::corrupt(format!("transactions.amount: {}", e)))?,
            currency: row.currency,
            account_type: row.account_type.parse().map_err(RepositoryError::corrupt)?,
            status: row.status.parse().map_err(RepositoryError::corrupt)?,
            recipient: row.recipient,
            payment_method: row.payment_method,
            notes: row.notes,
            loan_type: row.loan_type,
            loan_id: row.loan_id,
            cheque_details: row.cheque_details.map(|j| j.0),
            crypto_details: row.crypto_details.map(|j| j.0),
            transfer_details: row.transfer_details.map(|j| j.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_transactions(rows: Vec<TransactionRow>) -> RepositoryResult<Vec<Transaction>> {
    rows.into_iter().map(Transaction::try_from).collect()
}

pub async fn insert(conn: &mut PgConnection, tx: &Transaction) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, user_id, transaction_type, amount, currency, account_type, status,
            recipient, payment_method, notes, loan_type, loan_id,
            cheque_details, crypto_details, transfer_details, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.transaction_type.as_str())
    .bind(tx.amount.value())
    .bind(&tx.currency)
    .bind(tx.account_type.as_str())
    .bind(tx.status.as_str())
    .bind(&tx.recipient)
    .bind(&tx.payment_method)
    .bind(&tx.notes)
    .bind(&tx.loan_type)
    .bind(tx.loan_id)
    .bind(tx.cheque_details.as_ref().map(Json))
    .bind(tx.crypto_details.as_ref().map(Json))
    .bind(tx.transfer_details.as_ref().map(Json))
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> RepositoryResult<Option<Transaction>> {
    let row: Option<TransactionRow> = sqlx::query_as(select_transaction!("WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Transaction::try_from).transpose()
}

pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> RepositoryResult<Option<Transaction>> {
    let row: Option<TransactionRow> = sqlx::query_as(select_transaction!("WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Transaction::try_from).transpose()
}

/// Newest first
pub async fn list_by_user(conn: &mut PgConnection, user_id: Uuid) -> RepositoryResult<Vec<Transaction>> {
    let rows: Vec<TransactionRow> =
        sqlx::query_as(select_transaction!("WHERE user_id = $1 ORDER BY created_at DESC, id"))
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
    into_transactions(rows)
}

pub async fn list_all(conn: &mut PgConnection) -> RepositoryResult<Vec<Transaction>> {
    let rows: Vec<TransactionRow> = sqlx::query_as(select_transaction!("ORDER BY created_at DESC, id"))
        .fetch_all(&mut *conn)
        .await?;
    into_transactions(rows)
}

/// Write back the patchable fields and the status
pub async fn update(conn: &mut PgConnection, tx: &Transaction) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        UPDATE transactions SET
            amount = $2,
            notes = $3,
            recipient = $4,
            payment_method = $5,
            status = $6,
            updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(tx.id)
    .bind(tx.amount.value())
    .bind(&tx.notes)
    .bind(&tx.recipient)
    .bind(&tx.payment_method)
    .bind(tx.status.as_str())
    .bind(tx.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Delete a row that is not Completed
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> RepositoryResult<bool> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = $1 AND status <> 'Completed'")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Total of credit-limit increase requests still awaiting review
pub async fn pending_credit_limit_total(conn: &mut PgConnection, user_id: Uuid) -> RepositoryResult<Decimal> {
    let total: Option<Decimal> = sqlx::query_scalar(
        r#"
        SELECT SUM(amount)
        FROM transactions
        WHERE user_id = $1
          AND transaction_type = 'PAYMENT'
          AND payment_method = $2
          AND status IN ('Processing', 'In Progress')
        "#,
    )
    .bind(user_id)
    .bind(CREDIT_LIMIT_INCREASE)
    .fetch_one(&mut *conn)
    .await?;
    Ok(total.unwrap_or(Decimal::ZERO))
}

/// Completed and Cancelled rows of one account inside `[start, end)`
pub async fn list_in_window(
    conn: &mut PgConnection,
    user_id: Uuid,
    account_type: AccountType,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> RepositoryResult<Vec<Transaction>> {
    let rows: Vec<TransactionRow> = sqlx::query_as(select_transaction!(
        "WHERE user_id = $1 AND account_type = $2 AND created_at >= $3 AND created_at < $4 \
         AND status IN ('Completed', 'Cancelled') ORDER BY created_at, id"
    ))
    .bind(user_id)
    .bind(account_type.as_str())
    .bind(start)
    .bind(end)
    .fetch_all(&mut *conn)
    .await?;
    into_transactions(rows)
}

/// Completed rows of one account strictly before `before`
pub async fn list_completed_before(
    conn: &mut PgConnection,
    user_id: Uuid,
    account_type: AccountType,
    before: DateTime<Utc>,
) -> RepositoryResult<Vec<Transaction>> {
    let rows: Vec<TransactionRow> = sqlx::query_as(select_transaction!(
        "WHERE user_id = $1 AND account_type = $2 AND created_at < $3 \
         AND status = 'Completed' ORDER BY created_at, id"
    ))
    .bind(user_id)
    .bind(account_type.as_str())
    .bind(before)
    .fetch_all(&mut *conn)
    .await?;
    into_transactions(rows)
}
