//! Users table
//!
//! The three sub-accounts and the transient OTP/reset state are flat columns
//! on `users`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::aggregate::account::{CheckingAccount, InvestmentAccount, LoanAccount};
use crate::aggregate::{Aggregate, OtpChallenge, ResetTicket, SubAccounts, User};
use crate::domain::Balance;

use super::{RepositoryError, RepositoryResult};

macro_rules! select_user {
    ($clause:literal) => {
        concat!(
            "SELECT id, first_name, last_name, user_name, email, password_hash, date_of_birth, ",
            "phone_number, address, city, state, postal_code, country, ",
            "role, account_level, account_status, allow_transfer, verified, ",
            "checking_account_number, checking_balance, card_number, card_expiration_date, card_cvc, ",
            "loan_balance, credit_limit, investment_balance, ",
            "otp_code, otp_expires_at, reset_token_hash, reset_expires_at, ",
            "version, created_at, updated_at ",
            "FROM users ",
            $clause
        )
    };
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    user_name: String,
    email: String,
    password_hash: String,
    date_of_birth: NaiveDate,
    phone_number: String,
    address: String,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    role: String,
    account_level: String,
    account_status: String,
    allow_transfer: bool,
    verified: bool,
    checking_account_number: String,
    checking_balance: Decimal,
    card_number: String,
    card_expiration_date: NaiveDate,
    card_cvc: String,
    loan_balance: Decimal,
    credit_limit: Decimal,
    investment_balance: Decimal,
    otp_code: Option<String>,
    otp_expires_at: Option<DateTime<Utc>>,
    reset_token_hash: Option<String>,
    reset_expires_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn balance(value: Decimal, column: &str) -> RepositoryResult<Balance> {
    Balance::new(value).map_err(|e| RepositoryError::corrupt(format!("users.{}: {}", column, e)))
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let otp = match (row.otp_code, row.otp_expires_at) {
            (Some(code), Some(expires_at)) => Some(OtpChallenge { code, expires_at }),
            _ => None,
        };
        let reset = match (row.reset_token_hash, row.reset_expires_at) {
            (Some(token_hash), Some(expires_at)) => Some(ResetTicket { token_hash, expires_at }),
            _ => None,
        };

        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            user_name: row.user_name,
            email: row.email,
            password_hash: row.password_hash,
            date_of_birth: row.date_of_birth,
            phone_number: row.phone_number,
            address: row.address,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
            role: row.role.parse().map_err(RepositoryError::corrupt)?,
            account_level: row.account_level.parse().map_err(RepositoryError::corrupt)?,
            account_status: row.account_status.parse().map_err(RepositoryError::corrupt)?,
            allow_transfer: row.allow_transfer,
            verified: row.verified,
            accounts: SubAccounts {
                checking_account: CheckingAccount {
                    account_number: row.checking_account_number,
                    balance: balance(row.checking_balance, "checking_balance")?,
                    card_number: row.card_number,
                    expiration_date: row.card_expiration_date,
                    cvc: row.card_cvc,
                },
                loan_account: LoanAccount {
                    balance: balance(row.loan_balance, "loan_balance")?,
                    credit_limit: row.credit_limit,
                },
                investment_account: InvestmentAccount {
                    balance: balance(row.investment_balance, "investment_balance")?,
                },
            },
            otp,
            reset,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_user(row: Option<UserRow>) -> RepositoryResult<Option<User>> {
    row.map(User::try_from).transpose()
}

pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> RepositoryResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    into_user(row)
}

/// Load and row-lock a user for the rest of the database transaction
pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> RepositoryResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    into_user(row)
}

pub async fn find_by_account_number(conn: &mut PgConnection, account_number: &str) -> RepositoryResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE checking_account_number = $1"))
        .bind(account_number)
        .fetch_optional(&mut *conn)
        .await?;
    into_user(row)
}

pub async fn lock_by_account_number(conn: &mut PgConnection, account_number: &str) -> RepositoryResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE checking_account_number = $1 FOR UPDATE"))
        .bind(account_number)
        .fetch_optional(&mut *conn)
        .await?;
    into_user(row)
}

pub async fn lock_by_email(conn: &mut PgConnection, email: &str) -> RepositoryResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE lower(email) = lower($1) FOR UPDATE"))
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
    into_user(row)
}

pub async fn lock_by_reset_token_hash(conn: &mut PgConnection, token_hash: &str) -> RepositoryResult<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(select_user!("WHERE reset_token_hash = $1 FOR UPDATE"))
        .bind(token_hash)
        .fetch_optional(&mut *conn)
        .await?;
    into_user(row)
}

pub async fn email_exists(conn: &mut PgConnection, email: &str) -> RepositoryResult<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE lower(email) = lower($1))")
        .bind(email)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

pub async fn user_name_exists(conn: &mut PgConnection, user_name: &str) -> RepositoryResult<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE user_name = $1)")
        .bind(user_name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

pub async fn account_number_exists(conn: &mut PgConnection, account_number: &str) -> RepositoryResult<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE checking_account_number = $1)")
            .bind(account_number)
            .fetch_one(&mut *conn)
            .await?;
    Ok(exists)
}

pub async fn card_number_exists(conn: &mut PgConnection, card_number: &str) -> RepositoryResult<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE card_number = $1)")
        .bind(card_number)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists)
}

pub async fn insert(conn: &mut PgConnection, user: &User) -> RepositoryResult<()> {
    let accounts = &user.accounts;
    sqlx::query(
        r#"
        INSERT INTO users (
            id, first_name, last_name, user_name, email, password_hash, date_of_birth,
            phone_number, address, city, state, postal_code, country,
            role, account_level, account_status, allow_transfer, verified,
            checking_account_number, checking_balance, card_number, card_expiration_date, card_cvc,
            loan_balance, credit_limit, investment_balance,
            version, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29)
        "#,
    )
    .bind(user.id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.user_name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.date_of_birth)
    .bind(&user.phone_number)
    .bind(&user.address)
    .bind(&user.city)
    .bind(&user.state)
    .bind(&user.postal_code)
    .bind(&user.country)
    .bind(user.role.as_str())
    .bind(user.account_level.as_str())
    .bind(user.account_status.as_str())
    .bind(user.allow_transfer)
    .bind(user.verified)
    .bind(&accounts.checking_account.account_number)
    .bind(accounts.checking_account.balance.value())
    .bind(&accounts.checking_account.card_number)
    .bind(accounts.checking_account.expiration_date)
    .bind(&accounts.checking_account.cvc)
    .bind(accounts.loan_account.balance.value())
    .bind(accounts.loan_account.credit_limit)
    .bind(accounts.investment_account.balance.value())
    .bind(user.version)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Persist every mutable column, guarded by the loaded version.
///
/// On success the in-memory version is bumped to match the row.
pub async fn save(conn: &mut PgConnection, user: &mut User) -> RepositoryResult<()> {
    let accounts = &user.accounts;
    let result = sqlx::query(
        r#"
        UPDATE users SET
            password_hash = $3,
            account_level = $4,
            account_status = $5,
            allow_transfer = $6,
            verified = $7,
            checking_balance = $8,
            loan_balance = $9,
            credit_limit = $10,
            investment_balance = $11,
            otp_code = $12,
            otp_expires_at = $13,
            reset_token_hash = $14,
            reset_expires_at = $15,
            updated_at = $16,
            version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(user.id)
    .bind(user.version)
    .bind(&user.password_hash)
    .bind(user.account_level.as_str())
    .bind(user.account_status.as_str())
    .bind(user.allow_transfer)
    .bind(user.verified)
    .bind(accounts.checking_account.balance.value())
    .bind(accounts.loan_account.balance.value())
    .bind(accounts.loan_account.credit_limit)
    .bind(accounts.investment_account.balance.value())
    .bind(user.otp.as_ref().map(|o| o.code.as_str()))
    .bind(user.otp.as_ref().map(|o| o.expires_at))
    .bind(user.reset.as_ref().map(|r| r.token_hash.as_str()))
    .bind(user.reset.as_ref().map(|r| r.expires_at))
    .bind(user.updated_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::ConcurrencyConflict {
            aggregate_type: User::aggregate_type(),
            aggregate_id: user.id,
            expected: user.version,
        });
    }

    user.version += 1;
    Ok(())
}
