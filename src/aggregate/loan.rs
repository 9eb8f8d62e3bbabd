//! Loan Aggregate
//!
//! Amortization state of a loan and the arithmetic of applying a payment.

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::{Amount, DomainError};

use super::Aggregate;

/// Longest term accepted at origination (50 years)
pub const MAX_TERM_MONTHS: i32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Current,
    Late,
    Paid,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Current => "current",
            LoanStatus::Late => "late",
            LoanStatus::Paid => "paid",
            LoanStatus::Defaulted => "defaulted",
        }
    }
}

impl FromStr for LoanStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(LoanStatus::Current),
            "late" => Ok(LoanStatus::Late),
            "paid" => Ok(LoanStatus::Paid),
            "defaulted" => Ok(LoanStatus::Defaulted),
            other => Err(DomainError::validation(format!("Unknown loan status: {}", other))),
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `recentPayments`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPaymentEntry {
    pub date: DateTime<Utc>,
    pub amount: Decimal,
    pub status: String,
}

impl LoanPaymentEntry {
    fn completed(date: DateTime<Utc>, amount: Decimal) -> Self {
        Self {
            date,
            amount,
            status: "completed".to_string(),
        }
    }
}

/// Loan Aggregate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub(crate) id: Uuid,
    #[serde(rename = "user")]
    pub(crate) user_id: Uuid,
    pub(crate) loan_type: String,
    pub(crate) original_amount: Decimal,
    pub(crate) current_balance: Decimal,
    pub(crate) interest_rate: Decimal,
    pub(crate) term_months: i32,
    pub(crate) monthly_payment: Decimal,
    pub(crate) next_payment_amount: Decimal,
    pub(crate) payments_made: i32,
    pub(crate) payments_remaining: i32,
    pub(crate) progress: Decimal,
    pub(crate) status: LoanStatus,
    pub(crate) start_date: NaiveDate,
    pub(crate) next_payment_date: NaiveDate,
    pub(crate) recent_payments: Vec<LoanPaymentEntry>,
    #[serde(skip)]
    pub(crate) version: i64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

/// Level monthly installment, rounded to cents.
///
/// `rate` is the annual percentage; a zero rate splits the principal evenly.
pub fn monthly_installment(principal: Decimal, annual_rate: Decimal, term_months: i32) -> Result<Decimal, DomainError> {
    if term_months <= 0 || term_months > MAX_TERM_MONTHS {
        return Err(DomainError::validation(format!(
            "termMonths must be between 1 and {}",
            MAX_TERM_MONTHS
        )));
    }
    if annual_rate.is_sign_negative() {
        return Err(DomainError::validation("interestRate cannot be negative"));
    }

    let n = Decimal::from(term_months);
    let payment = if annual_rate.is_zero() {
        principal / n
    } else {
        let r = annual_rate / Decimal::from(1200);
        let base = Decimal::ONE + r;
        let mut growth = Decimal::ONE;
        for _ in 0..term_months {
            growth = growth
                .checked_mul(base)
                .ok_or_else(|| DomainError::validation("interestRate is too large"))?;
        }
        // P·r / (1 − (1+r)^−n) == P·r·g / (g − 1)
        principal * r * growth / (growth - Decimal::ONE)
    };

    Ok(payment.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

impl Loan {
    /// Originate a loan for `user_id`
    pub fn originate(
        user_id: Uuid,
        loan_type: String,
        principal: Amount,
        interest_rate: Decimal,
        term_months: i32,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let monthly_payment = monthly_installment(principal.value(), interest_rate, term_months)?;
        let start_date = now.date_naive();

        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            loan_type,
            original_amount: principal.value(),
            current_balance: principal.value(),
            interest_rate,
            term_months,
            monthly_payment,
            next_payment_amount: monthly_payment.min(principal.value()),
            payments_made: 0,
            payments_remaining: term_months,
            progress: Decimal::ZERO,
            status: LoanStatus::Current,
            start_date,
            next_payment_date: next_month(start_date),
            recent_payments: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply one payment and return the entry appended to `recentPayments`.
    ///
    /// The principal never goes below zero; reaching zero marks the loan paid.
    pub fn apply_payment(&mut self, amount: &Amount, paid_at: DateTime<Utc>) -> Result<LoanPaymentEntry, DomainError> {
        if self.status == LoanStatus::Paid {
            return Err(DomainError::LoanAlreadyPaid);
        }

        let remaining = self.current_balance - amount.value();
        self.payments_made += 1;
        self.payments_remaining = (self.payments_remaining - 1).max(0);

        if remaining <= Decimal::ZERO {
            self.current_balance = Decimal::ZERO;
            self.status = LoanStatus::Paid;
            self.payments_remaining = 0;
        } else {
            self.current_balance = remaining;
        }

        self.progress = if self.original_amount.is_zero() {
            Decimal::ZERO
        } else {
            (self.original_amount - self.current_balance) / self.original_amount * Decimal::ONE_HUNDRED
        };
        self.next_payment_amount = self.monthly_payment.min(self.current_balance);
        self.next_payment_date = next_month(self.next_payment_date);

        let entry = LoanPaymentEntry::completed(paid_at, amount.value());
        self.recent_payments.push(entry.clone());
        self.updated_at = paid_at;

        Ok(entry)
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn loan_type(&self) -> &str {
        &self.loan_type
    }

    pub fn current_balance(&self) -> Decimal {
        self.current_balance
    }

    pub fn status(&self) -> LoanStatus {
        self.status
    }

    pub fn progress(&self) -> Decimal {
        self.progress
    }

    pub fn payments_made(&self) -> i32 {
        self.payments_made
    }

    pub fn payments_remaining(&self) -> i32 {
        self.payments_remaining
    }

    pub fn monthly_payment(&self) -> Decimal {
        self.monthly_payment
    }

    pub fn next_payment_amount(&self) -> Decimal {
        self.next_payment_amount
    }

    pub fn next_payment_date(&self) -> NaiveDate {
        self.next_payment_date
    }

    pub fn recent_payments(&self) -> &[LoanPaymentEntry] {
        &self.recent_payments
    }
}

fn next_month(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(1)).unwrap_or(date)
}

impl Aggregate for Loan {
    fn aggregate_type() -> &'static str {
        "Loan"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn loan(principal: Decimal) -> Loan {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        Loan::originate(
            Uuid::new_v4(),
            "personal".to_string(),
            Amount::new(principal).unwrap(),
            dec!(6),
            12,
            now,
        )
        .unwrap()
    }

    #[test]
    fn test_monthly_installment() {
        // 10,000 at 6% over 12 months
        assert_eq!(monthly_installment(dec!(10000), dec!(6), 12).unwrap(), dec!(860.66));
        assert_eq!(monthly_installment(dec!(1200), dec!(0), 12).unwrap(), dec!(100));
    }

    #[test]
    fn test_monthly_installment_rejects_bad_terms() {
        assert!(monthly_installment(dec!(1000), dec!(5), 0).is_err());
        assert!(monthly_installment(dec!(1000), dec!(5), MAX_TERM_MONTHS + 1).is_err());
        assert!(monthly_installment(dec!(1000), dec!(-1), 12).is_err());
    }

    #[test]
    fn test_originate() {
        let loan = loan(dec!(10000));
        assert_eq!(loan.status(), LoanStatus::Current);
        assert_eq!(loan.payments_remaining(), 12);
        assert_eq!(loan.progress(), Decimal::ZERO);
        // End of month clamps to the last day of the next month
        assert_eq!(loan.next_payment_date(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_partial_payment_arithmetic() {
        let mut loan = loan(dec!(1000));
        let now = Utc::now();
        loan.apply_payment(&Amount::new(dec!(250)).unwrap(), now).unwrap();

        assert_eq!(loan.current_balance(), dec!(750));
        assert_eq!(loan.payments_made(), 1);
        assert_eq!(loan.payments_remaining(), 11);
        assert_eq!(loan.progress(), dec!(25));
        assert_eq!(loan.status(), LoanStatus::Current);
        assert_eq!(loan.next_payment_date(), NaiveDate::from_ymd_opt(2024, 3, 29).unwrap());
        assert_eq!(loan.recent_payments().len(), 1);
    }

    #[test]
    fn test_payment_of_full_balance_marks_paid() {
        let mut loan = loan(dec!(500));
        let entry = loan
            .apply_payment(&Amount::new(dec!(500)).unwrap(), Utc::now())
            .unwrap();

        assert_eq!(loan.current_balance(), Decimal::ZERO);
        assert_eq!(loan.status(), LoanStatus::Paid);
        assert_eq!(loan.progress(), dec!(100));
        assert_eq!(loan.next_payment_amount(), Decimal::ZERO);
        assert_eq!(entry.status, "completed");
        assert_eq!(loan.recent_payments(), &[entry]);
    }

    #[test]
    fn test_overpayment_clamps_to_zero() {
        let mut loan = loan(dec!(500));
        loan.apply_payment(&Amount::new(dec!(800)).unwrap(), Utc::now())
            .unwrap();

        assert_eq!(loan.current_balance(), Decimal::ZERO);
        assert_eq!(loan.status(), LoanStatus::Paid);
    }

    #[test]
    fn test_paid_loan_rejects_further_payments() {
        let mut loan = loan(dec!(100));
        loan.apply_payment(&Amount::new(dec!(100)).unwrap(), Utc::now())
            .unwrap();

        let err = loan
            .apply_payment(&Amount::new(dec!(1)).unwrap(), Utc::now())
            .unwrap_err();
        assert_eq!(err, DomainError::LoanAlreadyPaid);
        assert_eq!(loan.payments_made(), 1);
    }
}
