//! Loan Handlers
//!
//! Origination and the loan payment processor. A payment debits the chosen
//! sub-account, amortizes the loan and records a `LOAN_PAYMENT` transaction
//! in one database transaction.

use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::{Loan, NewTransaction, Transaction};
use crate::config::Config;
use crate::domain::{Amount, DomainError, OperationContext, TransactionStatus, TransactionType};
use crate::error::AppError;
use crate::ledger::LedgerMutator;
use crate::notification::NotificationService;
use crate::repository::{loans, transactions, users};

use super::transaction_handler::log_committed;
use super::{active_currency, require_principal, CreateLoanCommand, LoanPaymentCommand};

// =========================================================================
// Origination
// =========================================================================

pub struct CreateLoanHandler {
    pool: PgPool,
    notifications: NotificationService,
}

impl CreateLoanHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            notifications: NotificationService::new(pool.clone()),
            pool,
        }
    }

    pub async fn execute(&self, command: CreateLoanCommand, context: &OperationContext) -> Result<Loan, AppError> {
        require_principal(context)?.ensure_admin()?;
        if command.loan_type.trim().is_empty() {
            return Err(DomainError::validation("loanType is required").into());
        }
        let principal_amount =
            Amount::new(command.amount).map_err(|e| DomainError::InvalidAmount(e.to_string()))?;
        let now = Utc::now();

        let loan = Loan::originate(
            command.user_id,
            command.loan_type.trim().to_string(),
            principal_amount,
            command.interest_rate,
            command.term_months,
            now,
        )?;

        let mut tx = self.pool.begin().await?;
        users::find_by_id(&mut tx, command.user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        loans::insert(&mut tx, &loan).await?;
        tx.commit().await?;

        tracing::info!(
            loan_id = %loan.id,
            user_id = %loan.user_id(),
            amount = %principal_amount,
            monthly_payment = %loan.monthly_payment(),
            correlation_id = ?context.correlation_id,
            "Loan originated"
        );

        self.notifications
            .notify(
                loan.user_id(),
                format!(
                    "Your {} loan of {} was opened; monthly payment {}",
                    loan.loan_type(),
                    principal_amount,
                    loan.monthly_payment()
                ),
                context,
            )
            .await;

        Ok(loan)
    }
}

// =========================================================================
// Payment
// =========================================================================

/// Result of a loan payment
#[derive(Debug, serde::Serialize)]
pub struct LoanPaymentResult {
    pub loan: Loan,
    pub transaction: Transaction,
}

pub struct LoanPaymentHandler {
    pool: PgPool,
    config: Arc<Config>,
    notifications: NotificationService,
}

impl LoanPaymentHandler {
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        Self {
            notifications: NotificationService::new(pool.clone()),
            pool,
            config,
        }
    }

    pub async fn execute(
        &self,
        loan_id: Uuid,
        command: LoanPaymentCommand,
        context: &OperationContext,
    ) -> Result<LoanPaymentResult, AppError> {
        let principal = require_principal(context)?;
        if command.transaction_type != TransactionType::LoanPayment {
            return Err(DomainError::InvalidTransactionType {
                expected: TransactionType::LoanPayment,
                actual: command.transaction_type,
            }
            .into());
        }
        let amount = Amount::new(command.amount).map_err(|e| DomainError::InvalidAmount(e.to_string()))?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        let mut loan = loans::lock_by_id(&mut tx, loan_id)
            .await?
            .ok_or_else(|| AppError::not_found("Loan"))?;
        principal.ensure_owner_or_admin(loan.user_id())?;

        let mut user = users::lock_by_id(&mut tx, loan.user_id())
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        let currency_name = command
            .currency
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| self.config.default_currency.clone());
        let currency = active_currency(&mut tx, &currency_name).await?;

        let entry = loan.apply_payment(&amount, now)?;

        let transaction = Transaction::record(
            NewTransaction {
                user_id: user.id,
                transaction_type: TransactionType::LoanPayment,
                amount,
                currency: currency.name,
                account_type: command.account_type,
                recipient: None,
                payment_method: None,
                notes: command.notes,
                loan_type: Some(loan.loan_type().to_string()),
                loan_id: Some(loan.id),
                cheque_details: None,
                crypto_details: None,
                transfer_details: None,
            },
            TransactionStatus::Completed,
            now,
        );

        let outcome = LedgerMutator::apply(&mut user, &transaction, now)?;

        users::save(&mut tx, &mut user).await?;
        loans::save(&mut tx, &mut loan).await?;
        transactions::insert(&mut tx, &transaction).await?;
        tx.commit().await?;

        log_committed(&transaction, &outcome, context);
        tracing::info!(
            loan_id = %loan.id,
            paid = %entry.amount,
            current_balance = %loan.current_balance(),
            status = %loan.status(),
            correlation_id = ?context.correlation_id,
            "Loan payment applied"
        );

        let message = if loan.current_balance().is_zero() {
            format!("Your {} loan is fully paid off", loan.loan_type())
        } else {
            format!(
                "Loan payment of {} received; remaining balance {}",
                amount,
                loan.current_balance()
            )
        };
        self.notifications.notify(user.id, message, context).await;

        Ok(LoanPaymentResult { loan, transaction })
    }
}
