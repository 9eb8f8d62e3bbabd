//! Account Administration Handlers
//!
//! Back-office changes to a user's accounts. The balance override is the
//! one balance change that records no transaction.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::User;
use crate::domain::{Balance, DomainError, OperationContext};
use crate::error::AppError;
use crate::ledger::LedgerMutator;
use crate::notification::NotificationService;
use crate::repository::users;

use super::{require_principal, SetAccountLevelCommand, SetTransferAbilityCommand, UpdateBalanceCommand};

async fn lock_user(tx: &mut sqlx::PgConnection, user_id: Uuid) -> Result<User, AppError> {
    users::lock_by_id(tx, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

// =========================================================================
// Balance override
// =========================================================================

pub struct UpdateBalanceHandler {
    pool: PgPool,
    notifications: NotificationService,
}

impl UpdateBalanceHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            notifications: NotificationService::new(pool.clone()),
            pool,
        }
    }

    pub async fn execute(
        &self,
        user_id: Uuid,
        command: UpdateBalanceCommand,
        context: &OperationContext,
    ) -> Result<User, AppError> {
        let admin = require_principal(context)?;
        admin.ensure_admin()?;
        let balance = Balance::new(command.balance).map_err(|e| DomainError::InvalidAmount(e.to_string()))?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut user = lock_user(&mut tx, user_id).await?;
        LedgerMutator::override_balance(&mut user, command.account_type, balance, now);
        users::save(&mut tx, &mut user).await?;
        tx.commit().await?;

        tracing::warn!(
            user_id = %user_id,
            admin_id = %admin.user_id,
            correlation_id = ?context.correlation_id,
            "Balance override committed"
        );

        self.notifications
            .notify(
                user_id,
                format!("An administrator set your {} balance to {}", command.account_type, balance),
                context,
            )
            .await;
        Ok(user)
    }
}

// =========================================================================
// Transfer ability
// =========================================================================

pub struct SetTransferAbilityHandler {
    pool: PgPool,
    notifications: NotificationService,
}

impl SetTransferAbilityHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            notifications: NotificationService::new(pool.clone()),
            pool,
        }
    }

    pub async fn execute(
        &self,
        user_id: Uuid,
        command: SetTransferAbilityCommand,
        context: &OperationContext,
    ) -> Result<User, AppError> {
        require_principal(context)?.ensure_admin()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut user = lock_user(&mut tx, user_id).await?;
        user.set_transfer_ability(command.allow_transfer, now);
        users::save(&mut tx, &mut user).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            allow_transfer = command.allow_transfer,
            account_status = user.account_status().as_str(),
            correlation_id = ?context.correlation_id,
            "Transfer ability changed"
        );

        let message = if command.allow_transfer {
            "Transfers have been enabled on your account"
        } else {
            "Transfers have been disabled and your account is suspended"
        };
        self.notifications.notify(user_id, message, context).await;
        Ok(user)
    }
}

// =========================================================================
// Account level
// =========================================================================

pub struct SetAccountLevelHandler {
    pool: PgPool,
    notifications: NotificationService,
}

impl SetAccountLevelHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            notifications: NotificationService::new(pool.clone()),
            pool,
        }
    }

    pub async fn execute(
        &self,
        user_id: Uuid,
        command: SetAccountLevelCommand,
        context: &OperationContext,
    ) -> Result<User, AppError> {
        require_principal(context)?.ensure_admin()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut user = lock_user(&mut tx, user_id).await?;
        user.set_account_level(command.account_level, now);
        users::save(&mut tx, &mut user).await?;
        tx.commit().await?;

        tracing::info!(
            user_id = %user_id,
            account_level = %command.account_level,
            correlation_id = ?context.correlation_id,
            "Account level changed"
        );

        self.notifications
            .notify(
                user_id,
                format!("Your account level is now {}", command.account_level),
                context,
            )
            .await;
        Ok(user)
    }
}
