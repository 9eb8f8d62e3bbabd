//! Credit Limit Handler
//!
//! A credit-limit increase request is a `PAYMENT` transaction on the loan
//! account, left in Processing until an administrator completes or cancels it.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::aggregate::{NewTransaction, Transaction};
use crate::config::Config;
use crate::domain::{
    AccountType, Amount, DomainError, OperationContext, TransactionStatus, TransactionType,
    CREDIT_LIMIT_INCREASE,
};
use crate::error::AppError;
use crate::notification::NotificationService;
use crate::repository::{transactions, users};

use super::{active_currency, require_principal, CreditLimitCommand};

pub struct CreditLimitHandler {
    pool: PgPool,
    config: Arc<Config>,
    notifications: NotificationService,
}

impl CreditLimitHandler {
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        Self {
            notifications: NotificationService::new(pool.clone()),
            pool,
            config,
        }
    }

    pub async fn execute(&self, command: CreditLimitCommand, context: &OperationContext) -> Result<Transaction, AppError> {
        let principal = require_principal(context)?;
        if command.reason.trim().is_empty() {
            return Err(DomainError::validation("reason is required").into());
        }
        let amount = Amount::new(command.requested_limit).map_err(|e| DomainError::InvalidAmount(e.to_string()))?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let user = users::lock_by_id(&mut tx, principal.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        let pending = transactions::pending_credit_limit_total(&mut tx, user.id).await?;
        let would_be = user.check_credit_limit_request(pending, amount.value())?;

        let currency = active_currency(&mut tx, &self.config.default_currency).await?;

        let request = Transaction::record(
            NewTransaction {
                user_id: user.id,
                transaction_type: TransactionType::Payment,
                amount,
                currency: currency.name,
                account_type: AccountType::Loan,
                recipient: None,
                payment_method: Some(CREDIT_LIMIT_INCREASE.to_string()),
                notes: Some(command.notes()),
                loan_type: None,
                loan_id: None,
                cheque_details: None,
                crypto_details: None,
                transfer_details: None,
            },
            TransactionStatus::Processing,
            now,
        );
        transactions::insert(&mut tx, &request).await?;
        tx.commit().await?;

        tracing::info!(
            transaction_id = %request.id(),
            user_id = %user.id,
            requested = %amount,
            pending = %pending,
            limit_if_approved = %would_be,
            correlation_id = ?context.correlation_id,
            "Credit limit increase requested"
        );

        self.notifications
            .notify(
                user.id,
                format!("Your request to raise your credit limit by {} is under review", amount),
                context,
            )
            .await;

        Ok(request)
    }
}
