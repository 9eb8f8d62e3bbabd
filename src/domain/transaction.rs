//! Transaction vocabulary
//!
//! Transaction types, the status state machine, ledger effects and the
//! optional detail objects a transaction can carry.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DomainError;

/// `paymentMethod` marker for credit-limit increase requests
pub const CREDIT_LIMIT_INCREASE: &str = "CREDIT_LIMIT_INCREASE";

/// `paymentMethod` of the credit entry written for an internal transfer recipient
pub const INTERNAL_TRANSFER: &str = "INTERNAL_TRANSFER";

/// Kind of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    CryptoDeposit,
    ChequeDeposit,
    Withdrawal,
    Transfer,
    Payment,
    LoanPayment,
}

impl TransactionType {
    pub const ALL: [TransactionType; 7] = [
        Self::Deposit,
        Self::CryptoDeposit,
        Self::ChequeDeposit,
        Self::Withdrawal,
        Self::Transfer,
        Self::Payment,
        Self::LoanPayment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::CryptoDeposit => "CRYPTO_DEPOSIT",
            TransactionType::ChequeDeposit => "CHEQUE_DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Payment => "PAYMENT",
            TransactionType::LoanPayment => "LOAN_PAYMENT",
        }
    }

    pub fn is_deposit(&self) -> bool {
        matches!(
            self,
            TransactionType::Deposit | TransactionType::CryptoDeposit | TransactionType::ChequeDeposit
        )
    }

    /// Effect on the sub-account named by the transaction once it is Completed
    pub fn ledger_effect(&self) -> LedgerEffect {
        if self.is_deposit() {
            LedgerEffect::Credit
        } else {
            LedgerEffect::Debit
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("Invalid transaction type: {}", s)))
    }
}

/// Direction of a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    Credit,
    Debit,
}

/// Transaction status
///
/// Legal transitions:
/// `Processing -> In Progress | Completed | Cancelled`,
/// `In Progress -> Completed | Cancelled`.
/// Completed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Processing,
    #[serde(rename = "In Progress")]
    InProgress,
    Cancelled,
    Completed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Processing => "Processing",
            TransactionStatus::InProgress => "In Progress",
            TransactionStatus::Cancelled => "Cancelled",
            TransactionStatus::Completed => "Completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Completed | TransactionStatus::Cancelled)
    }

    /// Not yet settled either way
    pub fn is_pending(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(&self, to: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, to),
            (Processing, InProgress)
                | (Processing, Completed)
                | (Processing, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }

    /// The single entry point for status changes
    pub fn transition(self, to: TransactionStatus) -> Result<TransactionStatus, DomainError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(DomainError::IllegalStatusTransition { from: self, to })
        }
    }
}

impl Default for TransactionStatus {
    fn default() -> Self {
        Self::Processing
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(Self::Processing),
            "In Progress" => Ok(Self::InProgress),
            "Cancelled" => Ok(Self::Cancelled),
            "Completed" => Ok(Self::Completed),
            other => Err(DomainError::validation(format!("Invalid transaction status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChequeDetails {
    pub cheque_number: String,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub front_image_url: Option<String>,
    #[serde(default)]
    pub back_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoDetails {
    pub wallet_address: String,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDetails {
    /// Destination account number; an 11-digit number of this bank is credited internally
    pub account_number: String,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub routing_number: Option<String>,
    #[serde(default)]
    pub swift_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub international: bool,
}

/// Generic field patch for a transaction
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPatch {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Present only to be rejected: status moves through the transition endpoint
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionPatch {
    /// Fields that change what the ledger saw
    pub fn touches_ledger_fields(&self) -> bool {
        self.amount.is_some() || self.payment_method.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.notes.is_none()
            && self.recipient.is_none()
            && self.payment_method.is_none()
            && self.status.is_none()
    }

    /// Check the patch against the current status of the transaction
    pub fn validate_for(&self, status: TransactionStatus) -> Result<(), DomainError> {
        if self.status.is_some() {
            return Err(DomainError::validation(
                "status cannot be patched; use the status transition endpoint",
            ));
        }
        if self.is_empty() {
            return Err(DomainError::validation("no fields to update"));
        }
        if status == TransactionStatus::Completed && self.touches_ledger_fields() {
            return Err(DomainError::TransactionCompleted("re-priced"));
        }
        if let Some(amount) = self.amount {
            if amount <= Decimal::ZERO {
                return Err(DomainError::InvalidAmount("amount must be positive".to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_type_wire_names() {
        assert_eq!(serde_json::to_string(&TransactionType::LoanPayment).unwrap(), "\"LOAN_PAYMENT\"");
        assert_eq!(
            serde_json::from_str::<TransactionType>("\"CHEQUE_DEPOSIT\"").unwrap(),
            TransactionType::ChequeDeposit
        );
        for t in TransactionType::ALL {
            assert_eq!(t.as_str().parse::<TransactionType>().unwrap(), t);
        }
    }

    #[test]
    fn test_ledger_effects() {
        assert_eq!(TransactionType::Deposit.ledger_effect(), LedgerEffect::Credit);
        assert_eq!(TransactionType::CryptoDeposit.ledger_effect(), LedgerEffect::Credit);
        assert_eq!(TransactionType::Withdrawal.ledger_effect(), LedgerEffect::Debit);
        assert_eq!(TransactionType::Transfer.ledger_effect(), LedgerEffect::Debit);
        assert_eq!(TransactionType::LoanPayment.ledger_effect(), LedgerEffect::Debit);
    }

    #[test]
    fn test_status_wire_name_has_space() {
        assert_eq!(serde_json::to_string(&TransactionStatus::InProgress).unwrap(), "\"In Progress\"");
        assert_eq!("In Progress".parse::<TransactionStatus>().unwrap(), TransactionStatus::InProgress);
        assert_eq!(TransactionStatus::default(), TransactionStatus::Processing);
    }

    #[test]
    fn test_legal_transitions() {
        use TransactionStatus::*;
        assert_eq!(Processing.transition(Completed).unwrap(), Completed);
        assert_eq!(Processing.transition(Cancelled).unwrap(), Cancelled);
        assert_eq!(Processing.transition(InProgress).unwrap(), InProgress);
        assert_eq!(InProgress.transition(Completed).unwrap(), Completed);
        assert_eq!(InProgress.transition(Cancelled).unwrap(), Cancelled);
    }

    #[test]
    fn test_terminal_states_reject_every_transition() {
        use TransactionStatus::*;
        for from in [Completed, Cancelled] {
            for to in [Processing, InProgress, Cancelled, Completed] {
                assert!(matches!(
                    from.transition(to),
                    Err(DomainError::IllegalStatusTransition { .. })
                ));
            }
        }
        assert!(InProgress.transition(Processing).is_err());
    }

    #[test]
    fn test_patch_rejects_status_field() {
        let patch = TransactionPatch {
            status: Some("Completed".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            patch.validate_for(TransactionStatus::Processing),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_completed_transaction_accepts_notes_but_not_amount() {
        let notes = TransactionPatch {
            notes: Some("rent for March".to_string()),
            ..Default::default()
        };
        assert!(notes.validate_for(TransactionStatus::Completed).is_ok());

        let amount = TransactionPatch {
            amount: Some(dec!(10)),
            ..Default::default()
        };
        assert!(matches!(
            amount.validate_for(TransactionStatus::Completed),
            Err(DomainError::TransactionCompleted(_))
        ));
        assert!(amount.validate_for(TransactionStatus::Processing).is_ok());
    }

    #[test]
    fn test_transfer_details_deserialize() {
        let json = r#"{"accountNumber":"12345678901","bankName":"Other Bank","international":true}"#;
        let details: TransferDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.account_number, "12345678901");
        assert!(details.international);
        assert!(details.swift_code.is_none());
    }
}
