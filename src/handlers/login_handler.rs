//! Login Handlers
//!
//! Two-step login: account number and password, then the emailed OTP.
//! Administrators skip the second step.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::aggregate::User;
use crate::auth::{generate_otp, generate_token, sha256_hex};
use crate::config::Config;
use crate::domain::{DomainError, OperationContext, Principal};
use crate::error::AppError;
use crate::mailer::{EmailMessage, Mailer};
use crate::repository::{sessions, users};

use super::{LoginCommand, LoginResult, SessionResult, VerifyOtpCommand};

/// Open a session for `user` and return the plaintext bearer token
async fn open_session(
    conn: &mut PgConnection,
    user: &User,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let token = generate_token();
    let principal = Principal::new(user.id, user.role());
    sessions::insert(conn, &sha256_hex(&token), principal, now + config.session_ttl()).await?;
    Ok(token)
}

// =========================================================================
// Step 1: credentials
// =========================================================================

pub struct LoginHandler {
    pool: PgPool,
    config: Arc<Config>,
    mailer: Arc<dyn Mailer>,
}

impl LoginHandler {
    pub fn new(pool: PgPool, config: Arc<Config>, mailer: Arc<dyn Mailer>) -> Self {
        Self { pool, config, mailer }
    }

    pub async fn execute(&self, command: LoginCommand, context: &OperationContext) -> Result<LoginResult, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut user = users::lock_by_account_number(&mut tx, command.account_number.trim())
            .await?
            .ok_or(DomainError::InvalidCredentials)?;

        if !super::verify_password(command.password, user.password_hash().to_string()).await? {
            tracing::info!(user_id = %user.id, correlation_id = ?context.correlation_id, "Login rejected");
            return Err(DomainError::InvalidCredentials.into());
        }

        if !user.role().requires_second_factor() {
            user.mark_verified(now);
            users::save(&mut tx, &mut user).await?;
            let token = open_session(&mut tx, &user, &self.config, now).await?;
            tx.commit().await?;

            tracing::info!(user_id = %user.id, "Administrator logged in");
            return Ok(LoginResult {
                token: Some(token),
                message: "Login successful".to_string(),
                user: Some(user),
            });
        }

        let code = generate_otp();
        user.issue_otp(code.clone(), now, self.config.otp_ttl());
        users::save(&mut tx, &mut user).await?;

        // The OTP is stored only if the email went out
        self.mailer
            .send(EmailMessage::otp(
                &self.config.mail_from,
                user.email(),
                &user.full_name(),
                &code,
                self.config.otp_ttl_minutes,
            ))
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, correlation_id = ?context.correlation_id, "OTP issued");

        Ok(LoginResult {
            token: None,
            message: "A verification code has been sent to your email".to_string(),
            user: None,
        })
    }
}

// =========================================================================
// Step 2: OTP
// =========================================================================

pub struct VerifyOtpHandler {
    pool: PgPool,
    config: Arc<Config>,
}

impl VerifyOtpHandler {
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        Self { pool, config }
    }

    pub async fn execute(&self, command: VerifyOtpCommand, context: &OperationContext) -> Result<SessionResult, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut user = users::lock_by_account_number(&mut tx, command.account_number.trim())
            .await?
            .ok_or(DomainError::InvalidOrExpiredOtp)?;

        let code = command.otp_code.trim();
        let bypass = is_bypass_code(self.config.otp_bypass_code.as_deref(), code);

        if !user.role().requires_second_factor() {
            user.mark_verified(now);
        } else if bypass {
            tracing::warn!(user_id = %user.id, correlation_id = ?context.correlation_id, "OTP bypass code used");
            user.mark_verified(now);
        } else {
            user.verify_otp(code, now)?;
        }

        users::save(&mut tx, &mut user).await?;
        let token = open_session(&mut tx, &user, &self.config, now).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, correlation_id = ?context.correlation_id, "Session opened");

        Ok(SessionResult { token, user })
    }
}

/// Whether `code` is the configured development bypass code
fn is_bypass_code(configured: Option<&str>, code: &str) -> bool {
    configured
        .map(str::trim)
        .is_some_and(|bypass| !bypass.is_empty() && bypass == code.trim())
}

// =========================================================================
// Logout
// =========================================================================

pub struct LogoutHandler {
    pool: PgPool,
}

impl LogoutHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete the session behind `token_hash`
    pub async fn execute(&self, token_hash: &str, context: &OperationContext) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = sessions::delete(&mut conn, token_hash).await?;
        tracing::info!(user_id = ?context.actor_id(), deleted, "Logout");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bypass_code_compared_trimmed() {
        assert!(is_bypass_code(Some("000000"), "000000"));
        assert!(is_bypass_code(Some("000000"), " 000000\n"));
        assert!(!is_bypass_code(Some("000000"), "123456"));
        assert!(!is_bypass_code(None, "000000"));
        assert!(!is_bypass_code(Some(""), ""));
    }
}
