//! Domain module
//!
//! Core domain types and business rules.

pub mod account;
pub mod amount;
pub mod context;
pub mod error;
pub mod policy;
pub mod transaction;

pub use account::{AccountLevel, AccountStatus, AccountType};
pub use amount::{Amount, AmountError, Balance};
pub use context::OperationContext;
pub use error::DomainError;
pub use policy::{Principal, Role};
pub use transaction::{
    ChequeDetails, CryptoDetails, LedgerEffect, TransactionPatch, TransactionStatus,
    TransactionType, TransferDetails, CREDIT_LIMIT_INCREASE, INTERNAL_TRANSFER,
};
