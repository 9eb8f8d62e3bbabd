//! Account vocabulary
//!
//! Sub-account kinds, customer tiers and account status.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::DomainError;

/// One of a user's three embedded balances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    #[serde(rename = "checkingAccount")]
    Checking,
    #[serde(rename = "loanAccount")]
    Loan,
    #[serde(rename = "investmentAccount")]
    Investment,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [Self::Checking, Self::Loan, Self::Investment];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checkingAccount",
            AccountType::Loan => "loanAccount",
            AccountType::Investment => "investmentAccount",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("Invalid account type: {}", s)))
    }
}

/// Customer tier, determines the maximum loan credit limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountLevel {
    Regular,
    Ruby,
    Gold,
    Platinum,
}

impl AccountLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountLevel::Regular => "Regular",
            AccountLevel::Ruby => "Ruby",
            AccountLevel::Gold => "Gold",
            AccountLevel::Platinum => "Platinum",
        }
    }

    /// Maximum `loanAccount.creditLimit` for the tier (USD)
    pub fn credit_limit_ceiling(&self) -> Decimal {
        match self {
            AccountLevel::Platinum => Decimal::from(100_000),
            AccountLevel::Gold => Decimal::from(75_000),
            AccountLevel::Ruby => Decimal::from(50_000),
            AccountLevel::Regular => Decimal::from(25_000),
        }
    }
}

impl Default for AccountLevel {
    fn default() -> Self {
        Self::Regular
    }
}

impl fmt::Display for AccountLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Regular" => Ok(Self::Regular),
            "Ruby" => Ok(Self::Ruby),
            "Gold" => Ok(Self::Gold),
            "Platinum" => Ok(Self::Platinum),
            other => Err(DomainError::validation(format!("Invalid account level: {}", other))),
        }
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Suspended,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "Active",
            AccountStatus::Suspended => "Suspended",
        }
    }
}

impl Default for AccountStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl FromStr for AccountStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Suspended" => Ok(Self::Suspended),
            other => Err(DomainError::validation(format!("Invalid account status: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_account_type_round_trips_wire_names() {
        for t in AccountType::ALL {
            assert_eq!(t.as_str().parse::<AccountType>().unwrap(), t);
            assert_eq!(serde_json::to_string(&t).unwrap(), format!("\"{}\"", t.as_str()));
        }
    }

    #[test]
    fn test_unknown_account_type_is_validation_error() {
        let err = "savingsAccount".parse::<AccountType>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn test_credit_limit_ceilings() {
        assert_eq!(AccountLevel::Platinum.credit_limit_ceiling(), dec!(100000));
        assert_eq!(AccountLevel::Gold.credit_limit_ceiling(), dec!(75000));
        assert_eq!(AccountLevel::Ruby.credit_limit_ceiling(), dec!(50000));
        assert_eq!(AccountLevel::Regular.credit_limit_ceiling(), dec!(25000));
    }
}
