//! Transaction record
//!
//! An entry of the transaction log. Only `notes` and `recipient` may change
//! once Completed, and the status only moves through [`Transaction::transition`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    AccountType, Amount, ChequeDetails, CryptoDetails, DomainError, TransactionPatch,
    TransactionStatus, TransactionType, TransferDetails, CREDIT_LIMIT_INCREASE, INTERNAL_TRANSFER,
};

/// Fields supplied by the caller when recording a transaction
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: Amount,
    pub currency: String,
    pub account_type: AccountType,
    pub recipient: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub loan_type: Option<String>,
    pub loan_id: Option<Uuid>,
    pub cheque_details: Option<ChequeDetails>,
    pub crypto_details: Option<CryptoDetails>,
    pub transfer_details: Option<TransferDetails>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub(crate) id: Uuid,
    #[serde(rename = "user")]
    pub(crate) user_id: Uuid,
    #[serde(rename = "type")]
    pub(crate) transaction_type: TransactionType,
    pub(crate) amount: Amount,
    pub(crate) currency: String,
    pub(crate) account_type: AccountType,
    pub(crate) status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) recipient: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) loan_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) loan_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) cheque_details: Option<ChequeDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) crypto_details: Option<CryptoDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) transfer_details: Option<TransferDetails>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn record(new: NewTransaction, status: TransactionStatus, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            transaction_type: new.transaction_type,
            amount: new.amount,
            currency: new.currency,
            account_type: new.account_type,
            status,
            recipient: new.recipient,
            payment_method: new.payment_method,
            notes: new.notes,
            loan_type: new.loan_type,
            loan_id: new.loan_id,
            cheque_details: new.cheque_details,
            crypto_details: new.crypto_details,
            transfer_details: new.transfer_details,
            created_at,
            updated_at: created_at,
        }
    }

    /// The recipient's side of a completed internal transfer: a checking
    /// deposit that names the sender's account and transaction.
    pub fn transfer_credit(
        transfer: &Transaction,
        recipient_id: Uuid,
        sender_account_number: &str,
        settled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: recipient_id,
            transaction_type: TransactionType::Deposit,
            amount: transfer.amount,
            currency: transfer.currency.clone(),
            account_type: AccountType::Checking,
            status: TransactionStatus::Completed,
            recipient: Some(sender_account_number.to_string()),
            payment_method: Some(INTERNAL_TRANSFER.to_string()),
            notes: Some(format!(
                "Transfer {} from account {}",
                transfer.id, sender_account_number
            )),
            loan_type: None,
            loan_id: None,
            cheque_details: None,
            crypto_details: None,
            transfer_details: transfer.transfer_details.clone(),
            created_at: settled_at,
            updated_at: settled_at,
        }
    }

    /// `PAYMENT` marked as a credit-limit increase request
    pub fn is_credit_limit_request(&self) -> bool {
        self.transaction_type == TransactionType::Payment
            && self.payment_method.as_deref() == Some(CREDIT_LIMIT_INCREASE)
    }

    /// Completed and moves money (credit-limit requests never do)
    pub fn affects_balance(&self) -> bool {
        self.status == TransactionStatus::Completed && !self.is_credit_limit_request()
    }

    /// Apply a generic field patch
    pub fn apply_patch(&mut self, patch: &TransactionPatch, now: DateTime<Utc>) -> Result<(), DomainError> {
        patch.validate_for(self.status)?;

        if let Some(amount) = patch.amount {
            self.amount = Amount::new(amount).map_err(|e| DomainError::InvalidAmount(e.to_string()))?;
        }
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        if let Some(recipient) = &patch.recipient {
            self.recipient = Some(recipient.clone());
        }
        if let Some(method) = &patch.payment_method {
            self.payment_method = Some(method.clone());
        }
        self.updated_at = now;
        Ok(())
    }

    /// Move to `to`, returning the previous status
    pub fn transition(&mut self, to: TransactionStatus, now: DateTime<Utc>) -> Result<TransactionStatus, DomainError> {
        let from = self.status;
        self.status = from.transition(to)?;
        self.updated_at = now;
        Ok(from)
    }

    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        if self.status == TransactionStatus::Completed {
            Err(DomainError::TransactionCompleted("deleted"))
        } else {
            Ok(())
        }
    }

    /// Internal transfer destination, if any
    pub fn transfer_destination(&self) -> Option<&str> {
        match self.transaction_type {
            TransactionType::Transfer => self
                .transfer_details
                .as_ref()
                .map(|d| d.account_number.as_str()),
            _ => None,
        }
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    pub(crate) fn new_transaction(transaction_type: TransactionType, amount: rust_decimal::Decimal) -> NewTransaction {
        NewTransaction {
            user_id: Uuid::new_v4(),
            transaction_type,
            amount: Amount::new(amount).unwrap(),
            currency: "USD".to_string(),
            account_type: AccountType::Checking,
            recipient: None,
            payment_method: None,
            notes: None,
            loan_type: None,
            loan_id: None,
            cheque_details: None,
            crypto_details: None,
            transfer_details: None,
        }
    }

    #[test]
    fn test_completed_cannot_be_deleted() {
        let tx = Transaction::record(
            new_transaction(TransactionType::Deposit, dec!(10)),
            TransactionStatus::Completed,
            Utc::now(),
        );
        assert_eq!(tx.ensure_deletable(), Err(DomainError::TransactionCompleted("deleted")));

        let pending = Transaction::record(
            new_transaction(TransactionType::Deposit, dec!(10)),
            TransactionStatus::Processing,
            Utc::now(),
        );
        assert!(pending.ensure_deletable().is_ok());
    }

    #[test]
    fn test_completed_accepts_notes_but_not_amount() {
        let mut tx = Transaction::record(
            new_transaction(TransactionType::Withdrawal, dec!(10)),
            TransactionStatus::Completed,
            Utc::now(),
        );

        let notes = TransactionPatch {
            notes: Some("rent".to_string()),
            ..Default::default()
        };
        tx.apply_patch(&notes, Utc::now()).unwrap();
        assert_eq!(tx.notes(), Some("rent"));

        let amount = TransactionPatch {
            amount: Some(dec!(99)),
            ..Default::default()
        };
        assert!(tx.apply_patch(&amount, Utc::now()).is_err());
        assert_eq!(tx.amount().value(), dec!(10));
    }

    #[test]
    fn test_transition_through_state_machine() {
        let mut tx = Transaction::record(
            new_transaction(TransactionType::Deposit, dec!(10)),
            TransactionStatus::Processing,
            Utc::now(),
        );

        assert_eq!(
            tx.transition(TransactionStatus::InProgress, Utc::now()).unwrap(),
            TransactionStatus::Processing
        );
        tx.transition(TransactionStatus::Completed, Utc::now()).unwrap();
        assert!(matches!(
            tx.transition(TransactionStatus::Cancelled, Utc::now()),
            Err(DomainError::IllegalStatusTransition { .. })
        ));
        assert_eq!(tx.status(), TransactionStatus::Completed);
    }

    #[test]
    fn test_credit_limit_request_never_affects_balance() {
        let mut new = new_transaction(TransactionType::Payment, dec!(4000));
        new.payment_method = Some(CREDIT_LIMIT_INCREASE.to_string());
        let tx = Transaction::record(new, TransactionStatus::Completed, Utc::now());

        assert!(tx.is_credit_limit_request());
        assert!(!tx.affects_balance());
    }

    #[test]
    fn test_serialized_shape() {
        let tx = Transaction::record(
            new_transaction(TransactionType::LoanPayment, dec!(12.5)),
            TransactionStatus::Completed,
            Utc::now(),
        );
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "LOAN_PAYMENT");
        assert_eq!(json["accountType"], "checkingAccount");
        assert_eq!(json["status"], "Completed");
        assert!(json.get("notes").is_none());
    }
}
