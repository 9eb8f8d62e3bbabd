//! Password Reset Handlers

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::auth::{generate_token, sha256_hex};
use crate::config::Config;
use crate::domain::{DomainError, OperationContext};
use crate::error::AppError;
use crate::mailer::{EmailMessage, Mailer};
use crate::notification::NotificationService;
use crate::repository::{sessions, users};

use super::{validate_password, ForgotPasswordCommand, ResetPasswordCommand};

/// Answer of forgot-password, whether or not the address is known
pub const FORGOT_PASSWORD_MESSAGE: &str = "If that email is registered, a password reset link has been sent";

pub struct ForgotPasswordHandler {
    pool: PgPool,
    config: Arc<Config>,
    mailer: Arc<dyn Mailer>,
}

impl ForgotPasswordHandler {
    pub fn new(pool: PgPool, config: Arc<Config>, mailer: Arc<dyn Mailer>) -> Self {
        Self { pool, config, mailer }
    }

    pub async fn execute(&self, command: ForgotPasswordCommand, context: &OperationContext) -> Result<&'static str, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let Some(mut user) = users::lock_by_email(&mut tx, command.email.trim()).await? else {
            tracing::debug!(correlation_id = ?context.correlation_id, "Password reset requested for unknown email");
            return Ok(FORGOT_PASSWORD_MESSAGE);
        };

        let token = generate_token();
        user.issue_reset_token(sha256_hex(&token), now, self.config.reset_token_ttl());
        users::save(&mut tx, &mut user).await?;

        self.mailer
            .send(EmailMessage::password_reset(
                &self.config.mail_from,
                user.email(),
                &user.full_name(),
                &self.config.reset_link(&token),
                self.config.reset_token_ttl_minutes,
            ))
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id, correlation_id = ?context.correlation_id, "Password reset token issued");
        Ok(FORGOT_PASSWORD_MESSAGE)
    }
}

pub struct ResetPasswordHandler {
    pool: PgPool,
    notifications: NotificationService,
}

impl ResetPasswordHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            notifications: NotificationService::new(pool.clone()),
            pool,
        }
    }

    /// Consume the reset token and end every open session of the user
    pub async fn execute(&self, command: ResetPasswordCommand, context: &OperationContext) -> Result<(), AppError> {
        validate_password(&command.password)?;
        let token_hash = sha256_hex(command.token.trim());
        let new_hash = super::hash_password(command.password).await?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut user = users::lock_by_reset_token_hash(&mut tx, &token_hash)
            .await?
            .ok_or(DomainError::InvalidOrExpiredToken)?;

        user.complete_password_reset(&token_hash, new_hash, now)?;
        users::save(&mut tx, &mut user).await?;
        let revoked = sessions::delete_for_user(&mut tx, user.id).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user.id,
            revoked_sessions = revoked,
            correlation_id = ?context.correlation_id,
            "Password reset completed"
        );

        self.notifications
            .notify(user.id, "Your password was changed", context)
            .await;
        Ok(())
    }
}
