//! Loans table

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::aggregate::{Aggregate, Loan, LoanPaymentEntry};

use super::{RepositoryError, RepositoryResult};

macro_rules! select_loan {
    ($clause:literal) => {
        concat!(
            "SELECT id, user_id, loan_type, original_amount, current_balance, interest_rate, ",
            "term_months, monthly_payment, next_payment_amount, payments_made, payments_remaining, ",
            "progress, status, start_date, next_payment_date, recent_payments, ",
            "version, created_at, updated_at ",
            "FROM loans ",
            $clause
        )
    };
}

#[derive(Debug, sqlx::FromRow)]
struct LoanRow {
    id: Uuid,
    user_id: Uuid,
    loan_type: String,
    original_amount: Decimal,
    current_balance: Decimal,
    interest_rate: Decimal,
    term_months: i32,
    monthly_payment: Decimal,
    next_payment_amount: Decimal,
    payments_made: i32,
    payments_remaining: i32,
    progress: Decimal,
    status: String,
    start_date: NaiveDate,
    next_payment_date: NaiveDate,
    recent_payments: Json<Vec<LoanPaymentEntry>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LoanRow> for Loan {
    type Error = RepositoryError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        Ok(Loan {
            id: row.id,
            user_id: row.user_id,
            loan_type: row.loan_type,
            original_amount: row.original_amount,
            current_balance: row.current_balance,
            interest_rate: row.interest_rate,
            term_months: row.term_months,
            monthly_payment: row.monthly_payment,
            next_payment_amount: row.next_payment_amount,
            payments_made: row.payments_made,
            payments_remaining: row.payments_remaining,
            progress: row.progress,
            status: row.status.parse().map_err(RepositoryError::corrupt)?,
            start_date: row.start_date,
            next_payment_date: row.next_payment_date,
            recent_payments: row.recent_payments.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert(conn: &mut PgConnection, loan: &Loan) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO loans (
            id, user_id, loan_type, original_amount, current_balance, interest_rate,
            term_months, monthly_payment, next_payment_amount, payments_made, payments_remaining,
            progress, status, start_date, next_payment_date, recent_payments,
            version, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        "#,
    )
    .bind(loan.id)
    .bind(loan.user_id)
    .bind(&loan.loan_type)
    .bind(loan.original_amount)
    .bind(loan.current_balance)
    .bind(loan.interest_rate)
    .bind(loan.term_months)
    .bind(loan.monthly_payment)
    .bind(loan.next_payment_amount)
    .bind(loan.payments_made)
    .bind(loan.payments_remaining)
    .bind(loan.progress)
    .bind(loan.status.as_str())
    .bind(loan.start_date)
    .bind(loan.next_payment_date)
    .bind(Json(&loan.recent_payments))
    .bind(loan.version)
    .bind(loan.created_at)
    .bind(loan.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> RepositoryResult<Option<Loan>> {
    let row: Option<LoanRow> = sqlx::query_as(select_loan!("WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Loan::try_from).transpose()
}

pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> RepositoryResult<Option<Loan>> {
    let row: Option<LoanRow> = sqlx::query_as(select_loan!("WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Loan::try_from).transpose()
}

pub async fn list_by_user(conn: &mut PgConnection, user_id: Uuid) -> RepositoryResult<Vec<Loan>> {
    let rows: Vec<LoanRow> = sqlx::query_as(select_loan!("WHERE user_id = $1 ORDER BY created_at DESC"))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    rows.into_iter().map(Loan::try_from).collect()
}

pub async fn list_all(conn: &mut PgConnection) -> RepositoryResult<Vec<Loan>> {
    let rows: Vec<LoanRow> = sqlx::query_as(select_loan!("ORDER BY created_at DESC"))
        .fetch_all(&mut *conn)
        .await?;
    rows.into_iter().map(Loan::try_from).collect()
}

/// Persist the amortization state, guarded by the loaded version
pub async fn save(conn: &mut PgConnection, loan: &mut Loan) -> RepositoryResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE loans SET
            current_balance = $3,
            next_payment_amount = $4,
            payments_made = $5,
            payments_remaining = $6,
            progress = $7,
            status = $8,
            next_payment_date = $9,
            recent_payments = $10,
            updated_at = $11,
            version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(loan.id)
    .bind(loan.version)
    .bind(loan.current_balance)
    .bind(loan.next_payment_amount)
    .bind(loan.payments_made)
    .bind(loan.payments_remaining)
    .bind(loan.progress)
    .bind(loan.status.as_str())
    .bind(loan.next_payment_date)
    .bind(Json(&loan.recent_payments))
    .bind(loan.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::ConcurrencyConflict {
            aggregate_type: Loan::aggregate_type(),
            aggregate_id: loan.id,
            expected: loan.version,
        });
    }

    loan.version += 1;
    Ok(())
}
