//! Register Handler
//!
//! Opens a customer with zero balances, a generated checking account number
//! and a freshly issued card.

use chrono::{Months, Utc};
use sqlx::{PgConnection, PgPool};

use crate::aggregate::{SubAccounts, User};
use crate::auth::{generate_account_number, generate_card_number, generate_cvc, MAX_GENERATION_ATTEMPTS};
use crate::domain::OperationContext;
use crate::error::AppError;
use crate::notification::NotificationService;
use crate::repository::users;

use super::RegisterCommand;

/// Cards expire this many months after issuance
pub const CARD_VALIDITY_MONTHS: u32 = 60;

pub struct RegisterHandler {
    pool: PgPool,
    notifications: NotificationService,
}

impl RegisterHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            notifications: NotificationService::new(pool.clone()),
            pool,
        }
    }

    pub async fn execute(&self, command: RegisterCommand, context: &OperationContext) -> Result<User, AppError> {
        let now = Utc::now();
        command.validate(now.date_naive())?;
        let (new_user, password) = command.into_parts();

        let password_hash = super::hash_password(password).await?;

        let mut tx = self.pool.begin().await?;

        if users::email_exists(&mut tx, &new_user.email).await? {
            return Err(AppError::Conflict("email already registered".to_string()));
        }
        if users::user_name_exists(&mut tx, &new_user.user_name).await? {
            return Err(AppError::Conflict("user name already taken".to_string()));
        }

        let account_number = unique_number(&mut tx, IssuedNumber::Account).await?;
        let card_number = unique_number(&mut tx, IssuedNumber::Card).await?;

        let expiration_date = now
            .date_naive()
            .checked_add_months(Months::new(CARD_VALIDITY_MONTHS))
            .ok_or_else(|| AppError::Internal("card expiry out of range".to_string()))?;

        let accounts = SubAccounts::open(account_number, card_number, expiration_date, generate_cvc());
        let user = User::register(new_user, password_hash, accounts, now);

        users::insert(&mut tx, &user).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            account_number = %user.account_number(),
            correlation_id = ?context.correlation_id,
            "User registered"
        );

        self.notifications
            .notify(user.id, "Welcome! Your checking, loan and investment accounts are open.", context)
            .await;

        Ok(user)
    }
}

#[derive(Debug, Clone, Copy)]
enum IssuedNumber {
    Account,
    Card,
}

impl IssuedNumber {
    fn label(self) -> &'static str {
        match self {
            IssuedNumber::Account => "account number",
            IssuedNumber::Card => "card number",
        }
    }

    fn generate(self) -> String {
        match self {
            IssuedNumber::Account => generate_account_number(),
            IssuedNumber::Card => generate_card_number(),
        }
    }

    async fn is_taken(self, conn: &mut PgConnection, candidate: &str) -> Result<bool, AppError> {
        let taken = match self {
            IssuedNumber::Account => users::account_number_exists(conn, candidate).await?,
            IssuedNumber::Card => users::card_number_exists(conn, candidate).await?,
        };
        Ok(taken)
    }
}

/// Draw numbers until one is not taken, giving up after `MAX_GENERATION_ATTEMPTS`
async fn unique_number(conn: &mut PgConnection, kind: IssuedNumber) -> Result<String, AppError> {
    for attempt in 1..=MAX_GENERATION_ATTEMPTS {
        let candidate = kind.generate();
        if !kind.is_taken(&mut *conn, &candidate).await? {
            return Ok(candidate);
        }
        tracing::debug!(attempt, kind = kind.label(), "Generated number already in use, retrying");
    }
    Err(AppError::Internal(format!(
        "could not allocate a unique {} after {} attempts",
        kind.label(),
        MAX_GENERATION_ATTEMPTS
    )))
}
