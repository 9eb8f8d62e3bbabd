//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;

use super::account::AccountLevel;
use super::transaction::{TransactionStatus, TransactionType};

/// Domain-specific errors
///
/// These errors represent business rule violations and domain invariant failures.
/// They are independent of the web/infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Insufficient balance for debit operation
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Decimal, available: Decimal },

    /// Credit-limit increase above the tier ceiling
    #[error("Credit limit ceiling exceeded for {level} accounts: requested total {requested_total}, ceiling {ceiling}")]
    CreditLimitExceeded {
        level: AccountLevel,
        requested_total: Decimal,
        ceiling: Decimal,
    },

    /// Completed transactions cannot be deleted or materially altered
    #[error("Transaction is completed and cannot be {0}")]
    TransactionCompleted(&'static str),

    /// Status change not permitted by the transaction state machine
    #[error("Illegal status transition: {from} -> {to}")]
    IllegalStatusTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Operation requires a specific transaction type
    #[error("Invalid transaction type: expected {expected}, got {actual}")]
    InvalidTransactionType {
        expected: TransactionType,
        actual: TransactionType,
    },

    /// Loan is already fully repaid
    #[error("Loan is already paid off")]
    LoanAlreadyPaid,

    /// Account cannot send transfers
    #[error("Transfers are disabled for this account")]
    TransfersDisabled,

    /// Invalid amount (zero, negative, or exceeds limit)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Malformed or out-of-range input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unknown account number or wrong password
    #[error("Invalid account number or password")]
    InvalidCredentials,

    /// OTP missing, wrong or expired
    #[error("Invalid or expired OTP")]
    InvalidOrExpiredOtp,

    /// Password re-authentication failed
    #[error("Invalid password")]
    InvalidPassword,

    /// Reset token missing or expired
    #[error("Invalid or expired password reset token")]
    InvalidOrExpiredToken,

    /// Caller lacks the role or ownership for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Aggregate version conflict (optimistic locking)
    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: i64, found: i64 },
}

impl DomainError {
    /// Create an insufficient balance error
    pub fn insufficient_balance(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientBalance { required, available }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a forbidden error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Rule violation against current state (surfaced as `InvalidState`)
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::CreditLimitExceeded { .. }
                | Self::TransactionCompleted(_)
                | Self::IllegalStatusTransition { .. }
                | Self::InvalidTransactionType { .. }
                | Self::LoanAlreadyPaid
        )
    }

    /// Identity verification failure (surfaced as 401)
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::InvalidOrExpiredOtp | Self::InvalidPassword
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_balance_error() {
        let err = DomainError::insufficient_balance(dec!(100), dec!(50));

        assert!(err.is_invalid_state());
        assert!(!err.is_authentication_error());
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_credentials_message_does_not_leak_which_part_failed() {
        let err = DomainError::InvalidCredentials;

        assert!(err.is_authentication_error());
        assert_eq!(err.to_string(), "Invalid account number or password");
    }

    #[test]
    fn test_transition_error_names_both_states() {
        let err = DomainError::IllegalStatusTransition {
            from: TransactionStatus::Completed,
            to: TransactionStatus::Processing,
        };

        assert!(err.is_invalid_state());
        assert_eq!(err.to_string(), "Illegal status transition: Completed -> Processing");
    }
}
