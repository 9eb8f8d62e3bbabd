//! Sub-accounts
//!
//! The three balances embedded in every user: checking, loan and investment.
//! Balance mutation primitives live here; callers outside the ledger go
//! through `ledger::LedgerMutator`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountType, Amount, Balance, DomainError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckingAccount {
    pub account_number: String,
    pub balance: Balance,
    pub card_number: String,
    pub expiration_date: NaiveDate,
    #[serde(skip_serializing, default)]
    pub cvc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanAccount {
    pub balance: Balance,
    pub credit_limit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentAccount {
    pub balance: Balance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAccounts {
    pub checking_account: CheckingAccount,
    pub loan_account: LoanAccount,
    pub investment_account: InvestmentAccount,
}

impl SubAccounts {
    /// Fresh sub-accounts with zero balances and no credit line
    pub fn open(
        account_number: String,
        card_number: String,
        expiration_date: NaiveDate,
        cvc: String,
    ) -> Self {
        Self {
            checking_account: CheckingAccount {
                account_number,
                balance: Balance::zero(),
                card_number,
                expiration_date,
                cvc,
            },
            loan_account: LoanAccount {
                balance: Balance::zero(),
                credit_limit: Decimal::ZERO,
            },
            investment_account: InvestmentAccount {
                balance: Balance::zero(),
            },
        }
    }

    pub fn balance(&self, account_type: AccountType) -> Balance {
        match account_type {
            AccountType::Checking => self.checking_account.balance,
            AccountType::Loan => self.loan_account.balance,
            AccountType::Investment => self.investment_account.balance,
        }
    }

    fn balance_mut(&mut self, account_type: AccountType) -> &mut Balance {
        match account_type {
            AccountType::Checking => &mut self.checking_account.balance,
            AccountType::Loan => &mut self.loan_account.balance,
            AccountType::Investment => &mut self.investment_account.balance,
        }
    }

    /// Add to a sub-account, returning the new balance
    pub fn credit(&mut self, account_type: AccountType, amount: &Amount) -> Result<Balance, DomainError> {
        let slot = self.balance_mut(account_type);
        let updated = slot
            .credit(amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;
        *slot = updated;
        Ok(updated)
    }

    /// Subtract from a sub-account, refusing to go below zero
    pub fn debit(&mut self, account_type: AccountType, amount: &Amount) -> Result<Balance, DomainError> {
        let slot = self.balance_mut(account_type);
        if !slot.is_sufficient_for(amount) {
            return Err(DomainError::insufficient_balance(amount.value(), slot.value()));
        }
        let updated = slot
            .debit(amount)
            .map_err(|e| DomainError::InvalidAmount(e.to_string()))?;
        *slot = updated;
        Ok(updated)
    }

    /// Absolute overwrite, returns the previous balance
    pub fn set_balance(&mut self, account_type: AccountType, balance: Balance) -> Balance {
        std::mem::replace(self.balance_mut(account_type), balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn accounts() -> SubAccounts {
        SubAccounts::open(
            "12345678901".to_string(),
            "4000000000000002".to_string(),
            NaiveDate::from_ymd_opt(2031, 1, 31).unwrap(),
            "123".to_string(),
        )
    }

    #[test]
    fn test_open_starts_at_zero() {
        let accounts = accounts();
        for t in AccountType::ALL {
            assert_eq!(accounts.balance(t), Balance::zero());
        }
        assert_eq!(accounts.loan_account.credit_limit, Decimal::ZERO);
    }

    #[test]
    fn test_credit_and_debit_touch_only_the_named_account() {
        let mut accounts = accounts();
        accounts
            .credit(AccountType::Investment, &Amount::new(dec!(500)).unwrap())
            .unwrap();
        let left = accounts
            .debit(AccountType::Investment, &Amount::new(dec!(120.5)).unwrap())
            .unwrap();

        assert_eq!(left.value(), dec!(379.5));
        assert_eq!(accounts.balance(AccountType::Checking), Balance::zero());
    }

    #[test]
    fn test_debit_never_goes_negative() {
        let mut accounts = accounts();
        accounts
            .credit(AccountType::Checking, &Amount::new(dec!(50)).unwrap())
            .unwrap();

        let err = accounts
            .debit(AccountType::Checking, &Amount::new(dec!(50.01)).unwrap())
            .unwrap_err();
        assert_eq!(err, DomainError::insufficient_balance(dec!(50.01), dec!(50)));
        assert_eq!(accounts.balance(AccountType::Checking).value(), dec!(50));
    }

    #[test]
    fn test_cvc_is_never_serialized() {
        let json = serde_json::to_value(accounts()).unwrap();
        assert!(json["checkingAccount"].get("cvc").is_none());
        assert_eq!(json["checkingAccount"]["accountNumber"], "12345678901");
    }
}
