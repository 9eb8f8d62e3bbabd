//! User Aggregate
//!
//! Identity, credential-verification state and the three embedded
//! sub-accounts of a banking customer.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{AccountLevel, AccountStatus, DomainError, Role};
use crate::ledger;

use super::{Aggregate, SubAccounts};

/// Pending OTP second factor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    /// Code matches and `now` is strictly before expiry
    pub fn accepts(&self, code: &str, now: DateTime<Utc>) -> bool {
        self.code == code && now < self.expires_at
    }
}

/// Outstanding password reset (only the token hash is kept)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetTicket {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Registration data after validation
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub user_name: String,
    pub email: String,
    pub date_of_birth: NaiveDate,
    pub phone_number: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// User Aggregate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub(crate) id: Uuid,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
    pub(crate) user_name: String,
    pub(crate) email: String,
    #[serde(skip)]
    pub(crate) password_hash: String,
    pub(crate) date_of_birth: NaiveDate,
    pub(crate) phone_number: String,
    pub(crate) address: String,
    pub(crate) city: String,
    pub(crate) state: String,
    pub(crate) postal_code: String,
    pub(crate) country: String,
    pub(crate) role: Role,
    pub(crate) account_level: AccountLevel,
    pub(crate) account_status: AccountStatus,
    pub(crate) allow_transfer: bool,
    pub(crate) verified: bool,
    #[serde(flatten)]
    pub(crate) accounts: SubAccounts,
    #[serde(skip)]
    pub(crate) otp: Option<OtpChallenge>,
    #[serde(skip)]
    pub(crate) reset: Option<ResetTicket>,
    #[serde(skip)]
    pub(crate) version: i64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl User {
    /// Build a freshly registered customer with zero balances
    pub fn register(new: NewUser, password_hash: String, accounts: SubAccounts, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: new.first_name,
            last_name: new.last_name,
            user_name: new.user_name,
            email: new.email,
            password_hash,
            date_of_birth: new.date_of_birth,
            phone_number: new.phone_number,
            address: new.address,
            city: new.city,
            state: new.state,
            postal_code: new.postal_code,
            country: new.country,
            role: Role::User,
            account_level: AccountLevel::Regular,
            account_status: AccountStatus::Active,
            allow_transfer: true,
            verified: false,
            accounts,
            otp: None,
            reset: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    // =========================================================================
    // Second factor
    // =========================================================================

    pub fn issue_otp(&mut self, code: String, now: DateTime<Utc>, ttl: Duration) {
        self.otp = Some(OtpChallenge {
            code,
            expires_at: now + ttl,
        });
        self.verified = false;
        self.updated_at = now;
    }

    /// Consume the OTP; a code can be used at most once
    pub fn verify_otp(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), DomainError> {
        match &self.otp {
            Some(challenge) if challenge.accepts(code, now) => {
                self.mark_verified(now);
                Ok(())
            }
            _ => Err(DomainError::InvalidOrExpiredOtp),
        }
    }

    /// Verified without an OTP check (admin role or bypass code)
    pub fn mark_verified(&mut self, now: DateTime<Utc>) {
        self.otp = None;
        self.verified = true;
        self.updated_at = now;
    }

    // =========================================================================
    // Password reset
    // =========================================================================

    pub fn issue_reset_token(&mut self, token_hash: String, now: DateTime<Utc>, ttl: Duration) {
        self.reset = Some(ResetTicket {
            token_hash,
            expires_at: now + ttl,
        });
        self.updated_at = now;
    }

    /// Replace the password hash, consuming the reset ticket
    pub fn complete_password_reset(
        &mut self,
        token_hash: &str,
        new_password_hash: String,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        match &self.reset {
            Some(ticket) if ticket.token_hash == token_hash && now < ticket.expires_at => {
                self.password_hash = new_password_hash;
                self.reset = None;
                self.updated_at = now;
                Ok(())
            }
            _ => Err(DomainError::InvalidOrExpiredToken),
        }
    }

    // =========================================================================
    // Account administration
    // =========================================================================

    /// Disabling transfers suspends the account; enabling restores it
    pub fn set_transfer_ability(&mut self, allow: bool, now: DateTime<Utc>) {
        self.allow_transfer = allow;
        self.account_status = if allow {
            AccountStatus::Active
        } else {
            AccountStatus::Suspended
        };
        self.updated_at = now;
    }

    pub fn ensure_can_transfer(&self) -> Result<(), DomainError> {
        if self.allow_transfer && self.account_status == AccountStatus::Active {
            Ok(())
        } else {
            Err(DomainError::TransfersDisabled)
        }
    }

    pub fn set_account_level(&mut self, level: AccountLevel, now: DateTime<Utc>) {
        self.account_level = level;
        self.updated_at = now;
    }

    /// Check a credit-limit increase request against the tier ceiling,
    /// counting increases still awaiting review
    pub fn check_credit_limit_request(&self, pending: Decimal, requested: Decimal) -> Result<Decimal, DomainError> {
        ledger::check_credit_limit_increase(
            self.account_level,
            self.accounts.loan_account.credit_limit,
            pending,
            requested,
        )
    }

    /// Apply an approved increase
    pub fn raise_credit_limit(&mut self, increase: Decimal, now: DateTime<Utc>) -> Result<Decimal, DomainError> {
        let new_limit = ledger::check_credit_limit_increase(
            self.account_level,
            self.accounts.loan_account.credit_limit,
            Decimal::ZERO,
            increase,
        )?;
        self.accounts.loan_account.credit_limit = new_limit;
        self.updated_at = now;
        Ok(new_limit)
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn account_level(&self) -> AccountLevel {
        self.account_level
    }

    pub fn account_status(&self) -> AccountStatus {
        self.account_status
    }

    pub fn allow_transfer(&self) -> bool {
        self.allow_transfer
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn accounts(&self) -> &SubAccounts {
        &self.accounts
    }

    pub fn account_number(&self) -> &str {
        &self.accounts.checking_account.account_number
    }

    pub fn otp(&self) -> Option<&OtpChallenge> {
        self.otp.as_ref()
    }

    pub fn reset_ticket(&self) -> Option<&ResetTicket> {
        self.reset.as_ref()
    }
}

impl Aggregate for User {
    fn aggregate_type() -> &'static str {
        "User"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}
