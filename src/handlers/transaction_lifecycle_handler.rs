//! Transaction Lifecycle Handlers
//!
//! Field patches, deletion and the status state machine of recorded
//! transactions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::Transaction;
use crate::domain::{DomainError, OperationContext, TransactionPatch, TransactionStatus, CREDIT_LIMIT_INCREASE};
use crate::error::AppError;
use crate::ledger::LedgerMutator;
use crate::notification::NotificationService;
use crate::repository::{transactions, users};

use super::transaction_handler::{describe, describe_received, lock_parties, log_committed};
use super::{require_principal, TransitionStatusCommand};

// =========================================================================
// Patch
// =========================================================================

pub struct UpdateTransactionHandler {
    pool: PgPool,
}

impl UpdateTransactionHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Generic field patch. Completed transactions accept only `notes`
    /// and `recipient`; the status never changes here.
    pub async fn execute(
        &self,
        transaction_id: Uuid,
        patch: TransactionPatch,
        context: &OperationContext,
    ) -> Result<Transaction, AppError> {
        let principal = require_principal(context)?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut transaction = transactions::lock_by_id(&mut tx, transaction_id)
            .await?
            .ok_or_else(|| AppError::not_found("Transaction"))?;
        principal.ensure_owner_or_admin(transaction.user_id())?;
        patch.validate_for(transaction.status())?;

        let marks_credit_request = patch.payment_method.as_deref() == Some(CREDIT_LIMIT_INCREASE);
        if marks_credit_request != transaction.is_credit_limit_request() && patch.payment_method.is_some() {
            return Err(DomainError::validation(
                "paymentMethod cannot turn a transaction into or out of a credit-limit request",
            )
            .into());
        }

        if transaction.is_credit_limit_request() {
            if let Some(amount) = patch.amount {
                let user = users::lock_by_id(&mut tx, transaction.user_id())
                    .await?
                    .ok_or_else(|| AppError::not_found("User"))?;
                let pending = transactions::pending_credit_limit_total(&mut tx, user.id).await?
                    - transaction.amount().value();
                user.check_credit_limit_request(pending, amount)?;
            }
        }

        transaction.apply_patch(&patch, now)?;
        transactions::update(&mut tx, &transaction).await?;
        tx.commit().await?;

        tracing::info!(
            transaction_id = %transaction.id(),
            actor_id = %principal.user_id,
            correlation_id = ?context.correlation_id,
            "Transaction updated"
        );
        Ok(transaction)
    }
}

// =========================================================================
// Delete
// =========================================================================

pub struct DeleteTransactionHandler {
    pool: PgPool,
}

impl DeleteTransactionHandler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Completed transactions are never deleted, whoever asks
    pub async fn execute(&self, transaction_id: Uuid, context: &OperationContext) -> Result<(), AppError> {
        let principal = require_principal(context)?;
        let mut tx = self.pool.begin().await?;

        let transaction = transactions::lock_by_id(&mut tx, transaction_id)
            .await?
            .ok_or_else(|| AppError::not_found("Transaction"))?;
        principal.ensure_owner_or_admin(transaction.user_id())?;
        transaction.ensure_deletable()?;

        if !transactions::delete(&mut tx, transaction_id).await? {
            return Err(DomainError::TransactionCompleted("deleted").into());
        }
        tx.commit().await?;

        tracing::info!(
            transaction_id = %transaction_id,
            actor_id = %principal.user_id,
            correlation_id = ?context.correlation_id,
            "Transaction deleted"
        );
        Ok(())
    }
}

// =========================================================================
// Status transition
// =========================================================================

pub struct TransitionStatusHandler {
    pool: PgPool,
    notifications: NotificationService,
}

impl TransitionStatusHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            notifications: NotificationService::new(pool.clone()),
            pool,
        }
    }

    /// The only way a status changes. Reaching Completed applies the
    /// transaction to the ledger in the same database transaction.
    pub async fn execute(
        &self,
        transaction_id: Uuid,
        command: TransitionStatusCommand,
        context: &OperationContext,
    ) -> Result<Transaction, AppError> {
        require_principal(context)?.ensure_admin()?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let mut transaction = transactions::lock_by_id(&mut tx, transaction_id)
            .await?
            .ok_or_else(|| AppError::not_found("Transaction"))?;
        let from = transaction.transition(command.status, now)?;

        let mut settlement = None;
        if transaction.status() == TransactionStatus::Completed {
            let (mut user, mut recipient) =
                lock_parties(&mut tx, transaction.user_id(), transaction.transfer_destination()).await?;

            let settled = LedgerMutator::settle(&mut user, recipient.as_mut(), &transaction, now)?;
            users::save(&mut tx, &mut user).await?;
            if let Some(recipient) = recipient.as_mut() {
                users::save(&mut tx, recipient).await?;
            }
            if let Some(entry) = &settled.recipient_entry {
                transactions::insert(&mut tx, entry).await?;
            }
            settlement = Some(settled);
        }

        transactions::update(&mut tx, &transaction).await?;
        tx.commit().await?;

        if let Some(settlement) = &settlement {
            log_committed(&transaction, &settlement.outcome, context);
        }

        tracing::info!(
            transaction_id = %transaction.id(),
            from = %from,
            to = %transaction.status(),
            correlation_id = ?context.correlation_id,
            "Transaction status changed"
        );

        self.notifications
            .notify(transaction.user_id(), describe(&transaction), context)
            .await;
        if let Some(entry) = settlement.and_then(|s| s.recipient_entry) {
            self.notifications
                .notify(entry.user_id(), describe_received(&entry), context)
                .await;
        }
        Ok(transaction)
    }
}
