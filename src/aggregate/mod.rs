//! Aggregate module
//!
//! Aggregate roots loaded from and saved to the database as one unit.
//! Every aggregate carries a version; saves are rejected when the stored
//! version moved since the aggregate was loaded.

pub mod account;
pub mod loan;
pub mod transaction;
pub mod user;

pub use account::{CheckingAccount, InvestmentAccount, LoanAccount, SubAccounts};
pub use loan::{monthly_installment, Loan, LoanPaymentEntry, LoanStatus};
pub use transaction::{NewTransaction, Transaction};
pub use user::{NewUser, OtpChallenge, ResetTicket, User};

/// Aggregate trait that all aggregates must implement
pub trait Aggregate {
    /// Get the aggregate type name (for logging and conflict errors)
    fn aggregate_type() -> &'static str;

    /// Get the aggregate ID
    fn id(&self) -> uuid::Uuid;

    /// Version the aggregate had when it was loaded
    fn version(&self) -> i64;
}
