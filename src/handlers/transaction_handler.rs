//! Add Transaction Handler
//!
//! Records a transaction as Completed and applies it to the ledger in the
//! same database transaction. Internal transfers also credit the recipient
//! and write the credit entry into their log.

use chrono::Utc;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::aggregate::{NewTransaction, Transaction, User};
use crate::domain::{Amount, DomainError, OperationContext, TransactionStatus, TransactionType};
use crate::error::AppError;
use crate::ledger::{LedgerMutator, LedgerOutcome};
use crate::notification::NotificationService;
use crate::repository::{transactions, users, Currency};

use super::{active_currency, require_principal, AddTransactionCommand};

/// Owner fields shown next to a recorded transaction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub account_number: String,
}

impl From<&User> for OwnerSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            user_name: user.user_name.clone(),
            account_number: user.account_number().to_string(),
        }
    }
}

/// A recorded transaction with its owner and currency record
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub owner: OwnerSummary,
    pub currency_details: Currency,
}

impl TransactionView {
    pub fn new(transaction: Transaction, owner: &User, currency: Currency) -> Self {
        Self {
            transaction,
            owner: OwnerSummary::from(owner),
            currency_details: currency,
        }
    }
}

/// Who is submitting the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Submitter {
    Customer,
    Admin,
}

pub struct AddTransactionHandler {
    pool: PgPool,
    notifications: NotificationService,
}

impl AddTransactionHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            notifications: NotificationService::new(pool.clone()),
            pool,
        }
    }

    /// Customer path: the caller's own account, optional password re-check
    pub async fn execute(
        &self,
        command: AddTransactionCommand,
        context: &OperationContext,
    ) -> Result<TransactionView, AppError> {
        let principal = require_principal(context)?;
        command.validate()?;

        if command.created_at.is_some() {
            return Err(AppError::validation("createdAt can only be set by an administrator"));
        }
        if command.transaction_type == TransactionType::LoanPayment {
            return Err(AppError::validation(
                "LOAN_PAYMENT transactions are made through /loans/:loanId/payment",
            ));
        }
        if command.is_international_transfer() && command.password.is_none() {
            return Err(DomainError::InvalidPassword.into());
        }

        self.record(principal.user_id, command, Submitter::Customer, context).await
    }

    /// Back-office path: any user, no password check, optional backdating
    pub async fn execute_as_admin(
        &self,
        user_id: Uuid,
        command: AddTransactionCommand,
        context: &OperationContext,
    ) -> Result<TransactionView, AppError> {
        require_principal(context)?.ensure_admin()?;
        command.validate()?;

        if let Some(created_at) = command.created_at {
            if created_at > Utc::now() {
                return Err(AppError::validation("createdAt must not be in the future"));
            }
        }

        self.record(user_id, command, Submitter::Admin, context).await
    }

    async fn record(
        &self,
        user_id: Uuid,
        command: AddTransactionCommand,
        submitter: Submitter,
        context: &OperationContext,
    ) -> Result<TransactionView, AppError> {
        let amount = Amount::new(command.amount).map_err(|e| DomainError::InvalidAmount(e.to_string()))?;
        let now = Utc::now();
        let created_at = command.created_at.unwrap_or(now);

        let transaction = Transaction::record(
            NewTransaction {
                user_id,
                transaction_type: command.transaction_type,
                amount,
                currency: command.currency.trim().to_uppercase(),
                account_type: command.account_type,
                recipient: command.recipient,
                payment_method: command.payment_method,
                notes: command.notes,
                loan_type: command.loan_type,
                loan_id: None,
                cheque_details: command.cheque_details,
                crypto_details: command.crypto_details,
                transfer_details: command.transfer_details,
            },
            TransactionStatus::Completed,
            created_at,
        );

        let mut tx = self.pool.begin().await?;

        let (mut user, mut recipient) =
            lock_parties(&mut tx, user_id, transaction.transfer_destination()).await?;

        let currency = active_currency(&mut tx, transaction.currency()).await?;

        if submitter == Submitter::Customer {
            if let Some(password) = command.password {
                if !super::verify_password(password, user.password_hash().to_string()).await? {
                    return Err(DomainError::InvalidPassword.into());
                }
            }
        }

        let settlement = LedgerMutator::settle(&mut user, recipient.as_mut(), &transaction, now)?;
        users::save(&mut tx, &mut user).await?;
        if let Some(recipient) = recipient.as_mut() {
            users::save(&mut tx, recipient).await?;
        }

        transactions::insert(&mut tx, &transaction).await?;
        if let Some(entry) = &settlement.recipient_entry {
            transactions::insert(&mut tx, entry).await?;
        }
        tx.commit().await?;

        log_committed(&transaction, &settlement.outcome, context);

        self.notifications
            .notify(user.id, describe(&transaction), context)
            .await;
        if let Some(entry) = &settlement.recipient_entry {
            self.notifications
                .notify(entry.user_id(), describe_received(entry), context)
                .await;
        }

        Ok(TransactionView::new(transaction, &user, currency))
    }
}

/// Lock the owner and, for an internal transfer, the recipient.
///
/// Rows are locked in id order so two opposite transfers cannot deadlock.
/// A destination that is not an account of this bank yields no recipient.
pub(crate) async fn lock_parties(
    conn: &mut PgConnection,
    owner_id: Uuid,
    destination: Option<&str>,
) -> Result<(User, Option<User>), AppError> {
    let recipient_id = match destination {
        Some(account_number) => users::find_by_account_number(conn, account_number.trim())
            .await?
            .map(|u| u.id),
        None => None,
    };

    let (owner, recipient) = match recipient_id {
        Some(id) if id == owner_id => {
            return Err(AppError::validation("cannot transfer to your own account"));
        }
        Some(id) if owner_id < id => {
            let owner = users::lock_by_id(conn, owner_id).await?;
            let recipient = users::lock_by_id(conn, id).await?;
            (owner, recipient)
        }
        Some(id) => {
            let recipient = users::lock_by_id(conn, id).await?;
            let owner = users::lock_by_id(conn, owner_id).await?;
            (owner, recipient)
        }
        None => (users::lock_by_id(conn, owner_id).await?, None),
    };

    let owner = owner.ok_or_else(|| AppError::not_found("User"))?;
    Ok((owner, recipient))
}

pub(crate) fn log_committed(transaction: &Transaction, outcome: &LedgerOutcome, context: &OperationContext) {
    match outcome {
        LedgerOutcome::Balance {
            account_type,
            before,
            after,
        } => tracing::info!(
            transaction_id = %transaction.id(),
            user_id = %transaction.user_id(),
            transaction_type = %transaction.transaction_type(),
            amount = %transaction.amount(),
            account_type = %account_type,
            before = %before.value(),
            after = %after.value(),
            correlation_id = ?context.correlation_id,
            "Transaction applied"
        ),
        LedgerOutcome::CreditLimit { before, after } => tracing::info!(
            transaction_id = %transaction.id(),
            user_id = %transaction.user_id(),
            before = %before,
            after = %after,
            correlation_id = ?context.correlation_id,
            "Credit limit raised"
        ),
        LedgerOutcome::Deferred => tracing::info!(
            transaction_id = %transaction.id(),
            user_id = %transaction.user_id(),
            status = %transaction.status(),
            correlation_id = ?context.correlation_id,
            "Transaction recorded"
        ),
    }
}

/// Notification text for the recipient of an internal transfer
pub(crate) fn describe_received(entry: &Transaction) -> String {
    format!(
        "You received {} {} from account {}",
        entry.amount(),
        entry.currency(),
        entry.recipient().unwrap_or_default()
    )
}

/// Notification text for a transaction owner
pub(crate) fn describe(transaction: &Transaction) -> String {
    format!(
        "Your {} of {} {} on your {} is {}",
        transaction.transaction_type(),
        transaction.amount(),
        transaction.currency(),
        transaction.account_type(),
        transaction.status()
    )
}

