//! Command Handlers module
//!
//! Handlers orchestrate one business operation each: load and lock the
//! aggregates, apply the domain rules, persist inside one database
//! transaction and write notifications once it has committed.

mod account_admin_handler;
mod commands;
mod credit_limit_handler;
mod loan_handler;
mod login_handler;
mod password_reset_handler;
mod register_handler;
mod statement_handler;
mod transaction_handler;
mod transaction_lifecycle_handler;


pub use account_admin_handler::{SetAccountLevelHandler, SetTransferAbilityHandler, UpdateBalanceHandler};
pub use commands::*;
pub use credit_limit_handler::CreditLimitHandler;
pub use loan_handler::{CreateLoanHandler, LoanPaymentHandler, LoanPaymentResult};
pub use login_handler::{LoginHandler, LogoutHandler, VerifyOtpHandler};
pub use password_reset_handler::{ForgotPasswordHandler, ResetPasswordHandler};
pub use register_handler::RegisterHandler;
pub use statement_handler::{CreateStatementHandler, StatementReportHandler};
pub use transaction_handler::{AddTransactionHandler, OwnerSummary, TransactionView};
pub use transaction_lifecycle_handler::{
    DeleteTransactionHandler, TransitionStatusHandler, UpdateTransactionHandler,
};

use sqlx::PgConnection;

use crate::auth;
use crate::domain::{OperationContext, Principal};
use crate::error::AppError;
use crate::repository::{currencies, Currency};

/// The authenticated caller, or 401
pub(crate) fn require_principal(context: &OperationContext) -> Result<Principal, AppError> {
    context
        .principal
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))
}

/// Argon2 off the async runtime
pub(crate) async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

pub(crate) async fn verify_password(password: String, stored_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || auth::verify_password(&password, &stored_hash))
        .await
        .map_err(|e| AppError::Internal(format!("password verification task failed: {}", e)))?
        .map_err(AppError::from)
}

/// A currency that exists and accepts new transactions
pub(crate) async fn active_currency(conn: &mut PgConnection, name: &str) -> Result<Currency, AppError> {
    let currency = currencies::find_by_name(conn, name)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Currency {}", name)))?;
    if !currency.active {
        return Err(AppError::validation(format!("currency {} is not active", name)));
    }
    Ok(currency)
}
