//! Account ledger
//!
//! `LedgerMutator` is the only place a recorded transaction changes a
//! sub-account balance or the credit line. It works on loaded aggregates;
//! callers persist the result in the same database transaction as the
//! transaction row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::aggregate::{Transaction, User};
use crate::domain::{AccountLevel, AccountType, Balance, DomainError, LedgerEffect, TransactionType};

/// Validate a credit-limit increase and return the limit it would produce.
///
/// `pending` is the sum of increases still awaiting review; they count
/// against the ceiling as if already granted.
pub fn check_credit_limit_increase(
    level: AccountLevel,
    current_limit: Decimal,
    pending: Decimal,
    requested: Decimal,
) -> Result<Decimal, DomainError> {
    if requested <= Decimal::ZERO {
        return Err(DomainError::InvalidAmount(
            "requested credit limit increase must be positive".to_string(),
        ));
    }

    let ceiling = level.credit_limit_ceiling();
    let requested_total = current_limit + pending + requested;
    if requested_total > ceiling {
        return Err(DomainError::CreditLimitExceeded {
            level,
            requested_total,
            ceiling,
        });
    }

    Ok(current_limit + requested)
}

/// What applying a transaction changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// Transaction not Completed yet
    Deferred,
    Balance {
        account_type: AccountType,
        before: Balance,
        after: Balance,
    },
    CreditLimit {
        before: Decimal,
        after: Decimal,
    },
}

/// Everything settling one transaction changed
#[derive(Debug, Clone)]
pub struct Settlement {
    pub outcome: LedgerOutcome,
    /// Credit entry owned by the recipient of an internal transfer
    pub recipient_entry: Option<Transaction>,
}

pub struct LedgerMutator;

impl LedgerMutator {
    /// Apply a transaction to the user that owns it.
    ///
    /// Only Completed transactions have an effect. A completed credit-limit
    /// request raises the credit line instead of moving money.
    pub fn apply(user: &mut User, transaction: &Transaction, now: DateTime<Utc>) -> Result<LedgerOutcome, DomainError> {
        if transaction.status() != crate::domain::TransactionStatus::Completed {
            return Ok(LedgerOutcome::Deferred);
        }
        if transaction.user_id() != user.id {
            return Err(DomainError::forbidden("transaction belongs to another user"));
        }

        if transaction.is_credit_limit_request() {
            let before = user.accounts.loan_account.credit_limit;
            let after = user.raise_credit_limit(transaction.amount().value(), now)?;
            return Ok(LedgerOutcome::CreditLimit { before, after });
        }

        let account_type = transaction.account_type();
        let before = user.accounts.balance(account_type);
        let after = match transaction.transaction_type().ledger_effect() {
            LedgerEffect::Credit => user.accounts.credit(account_type, &transaction.amount())?,
            LedgerEffect::Debit => user.accounts.debit(account_type, &transaction.amount())?,
        };
        user.updated_at = now;

        Ok(LedgerOutcome::Balance {
            account_type,
            before,
            after,
        })
    }

    /// Credit the checking account of an internal transfer recipient
    pub fn credit_transfer_recipient(
        recipient: &mut User,
        transaction: &Transaction,
        now: DateTime<Utc>,
    ) -> Result<LedgerOutcome, DomainError> {
        if !transaction.affects_balance() {
            return Ok(LedgerOutcome::Deferred);
        }

        let before = recipient.accounts.balance(AccountType::Checking);
        let after = recipient
            .accounts
            .credit(AccountType::Checking, &transaction.amount())?;
        recipient.updated_at = now;

        Ok(LedgerOutcome::Balance {
            account_type: AccountType::Checking,
            before,
            after,
        })
    }

    /// Settle a transaction against its owner and, for an internal
    /// transfer, its recipient.
    ///
    /// A completed TRANSFER requires the sender to be allowed to transfer.
    /// The recipient's credit comes back as its own transaction, to be
    /// inserted in the same unit of work as the sender's row.
    pub fn settle(
        user: &mut User,
        recipient: Option<&mut User>,
        transaction: &Transaction,
        now: DateTime<Utc>,
    ) -> Result<Settlement, DomainError> {
        if transaction.transaction_type() == TransactionType::Transfer && transaction.affects_balance() {
            user.ensure_can_transfer()?;
        }

        let outcome = Self::apply(user, transaction, now)?;

        let recipient_entry = match recipient {
            Some(recipient) if transaction.affects_balance() => {
                Self::credit_transfer_recipient(recipient, transaction, now)?;
                Some(Transaction::transfer_credit(
                    transaction,
                    recipient.id,
                    user.account_number(),
                    now,
                ))
            }
            _ => None,
        };

        Ok(Settlement {
            outcome,
            recipient_entry,
        })
    }

    /// Back-office absolute overwrite. No transaction is recorded for it.
    pub fn override_balance(user: &mut User, account_type: AccountType, balance: Balance, now: DateTime<Utc>) -> LedgerOutcome {
        let before = user.accounts.set_balance(account_type, balance);
        user.updated_at = now;

        tracing::warn!(
            user_id = %user.id,
            account_type = %account_type,
            before = %before.value(),
            after = %balance.value(),
            "Admin balance override"
        );

        LedgerOutcome::Balance {
            account_type,
            before,
            after: balance,
        }
    }
}
