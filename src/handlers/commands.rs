//! Command definitions
//!
//! Commands carry the caller's intent into a handler. Most of them double as
//! the JSON request body of their endpoint.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{NewUser, User};
use crate::domain::{
    AccountLevel, AccountType, ChequeDetails, CryptoDetails, DomainError, TransactionStatus,
    TransactionType, TransferDetails, CREDIT_LIMIT_INCREASE,
};
use crate::statement::StatementFormat;

pub const MIN_PASSWORD_LENGTH: usize = 8;

fn require(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        Err(DomainError::validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

pub(crate) fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(DomainError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), DomainError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') => Ok(()),
        _ => Err(DomainError::validation("email is not a valid address")),
    }
}

// =========================================================================
// Identity
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCommand {
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: NaiveDate,
    pub phone_number: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl RegisterCommand {
    pub fn validate(&self, today: NaiveDate) -> Result<(), DomainError> {
        for (field, value) in [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("userName", &self.user_name),
            ("email", &self.email),
            ("phoneNumber", &self.phone_number),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ] {
            require(field, value)?;
        }
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if self.date_of_birth >= today {
            return Err(DomainError::validation("dateOfBirth must be in the past"));
        }
        Ok(())
    }

    /// Profile fields, with the password split off
    pub fn into_parts(self) -> (NewUser, String) {
        let new_user = NewUser {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            user_name: self.user_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            date_of_birth: self.date_of_birth,
            phone_number: self.phone_number,
            address: self.address,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
        };
        (new_user, self.password)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginCommand {
    pub account_number: String,
    pub password: String,
}

impl LoginCommand {
    pub fn new(account_number: String, password: String) -> Self {
        Self {
            account_number,
            password,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpCommand {
    pub account_number: String,
    pub otp_code: String,
}

impl VerifyOtpCommand {
    pub fn new(account_number: String, otp_code: String) -> Self {
        Self {
            account_number,
            otp_code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordCommand {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordCommand {
    pub token: String,
    pub password: String,
}

/// Outcome of the first login step
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// A newly opened bearer session
#[derive(Debug, Serialize)]
pub struct SessionResult {
    pub token: String,
    pub user: User,
}

// =========================================================================
// Transactions
// =========================================================================

/// Body of `POST /transactions` and of the admin variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTransactionCommand {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub loan_type: Option<String>,
    #[serde(default)]
    pub cheque_details: Option<ChequeDetails>,
    #[serde(default)]
    pub crypto_details: Option<CryptoDetails>,
    #[serde(default)]
    pub transfer_details: Option<TransferDetails>,
    /// Re-authentication; required for international transfers
    #[serde(default)]
    pub password: Option<String>,
    /// Backdating, honored on the admin path only
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AddTransactionCommand {
    pub fn new(transaction_type: TransactionType, amount: Decimal, currency: String, account_type: AccountType) -> Self {
        Self {
            transaction_type,
            amount,
            currency,
            account_type,
            recipient: None,
            payment_method: None,
            notes: None,
            loan_type: None,
            cheque_details: None,
            crypto_details: None,
            transfer_details: None,
            password: None,
            created_at: None,
        }
    }

    pub fn with_password(mut self, password: String) -> Self {
        self.password = Some(password);
        self
    }

    pub fn with_notes(mut self, notes: String) -> Self {
        self.notes = Some(notes);
        self
    }

    pub fn with_transfer_details(mut self, details: TransferDetails) -> Self {
        self.transfer_details = Some(details);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn is_international_transfer(&self) -> bool {
        self.transaction_type == TransactionType::Transfer
            && self.transfer_details.as_ref().is_some_and(|d| d.international)
    }

    /// Rules shared by the customer and admin paths.
    ///
    /// Both record Completed, so a credit-limit marker here would raise the
    /// credit line without review.
    pub fn validate(&self) -> Result<(), DomainError> {
        let credit_limit_marker = self
            .payment_method
            .as_deref()
            .is_some_and(|method| method.trim().eq_ignore_ascii_case(CREDIT_LIMIT_INCREASE));
        if credit_limit_marker {
            return Err(DomainError::Validation(
                "credit-limit increases are requested through /transactions/credit-limit".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionStatusCommand {
    pub status: TransactionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditLimitCommand {
    /// Requested increase of the credit line
    pub requested_limit: Decimal,
    pub reason: String,
    #[serde(default)]
    pub additional_info: Option<String>,
}

impl CreditLimitCommand {
    pub fn new(requested_limit: Decimal, reason: String) -> Self {
        Self {
            requested_limit,
            reason,
            additional_info: None,
        }
    }

    pub fn with_additional_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }

    /// Free text kept in the notes of the request transaction
    pub fn notes(&self) -> String {
        match &self.additional_info {
            Some(info) if !info.trim().is_empty() => format!("{} ({})", self.reason.trim(), info.trim()),
            _ => self.reason.trim().to_string(),
        }
    }
}

// =========================================================================
// Loans
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanCommand {
    pub user_id: Uuid,
    pub loan_type: String,
    pub amount: Decimal,
    pub interest_rate: Decimal,
    pub term_months: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPaymentCommand {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub account_type: AccountType,
    /// Falls back to the configured default currency
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl LoanPaymentCommand {
    pub fn new(amount: Decimal, account_type: AccountType) -> Self {
        Self {
            transaction_type: TransactionType::LoanPayment,
            amount,
            account_type,
            currency: None,
            notes: None,
        }
    }
}

// =========================================================================
// Statements
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStatementCommand {
    pub account_type: AccountType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub format: StatementFormat,
}

// =========================================================================
// Back office
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBalanceCommand {
    pub account_type: AccountType,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTransferAbilityCommand {
    pub allow_transfer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAccountLevelCommand {
    pub account_level: AccountLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCurrencyCommand {
    pub name: String,
    pub wallet_address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCurrencyCommand {
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}
