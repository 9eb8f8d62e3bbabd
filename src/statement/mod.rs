//! Statement generator
//!
//! A statement is stored only as a request (account, date range, format).
//! Its balances are replayed from the transaction log on every read.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::Transaction;
use crate::domain::{AccountType, DomainError, TransactionStatus, TransactionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementFormat {
    Pdf,
    Csv,
}

impl StatementFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementFormat::Pdf => "pdf",
            StatementFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for StatementFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(Self::Pdf),
            "csv" => Ok(Self::Csv),
            other => Err(DomainError::validation(format!("Invalid statement format: {}", other))),
        }
    }
}

/// Statement request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub account_type: AccountType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub format: StatementFormat,
    pub created_at: DateTime<Utc>,
}

impl Statement {
    pub fn request(
        user_id: Uuid,
        account_type: AccountType,
        start_date: NaiveDate,
        end_date: NaiveDate,
        format: StatementFormat,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if start_date > end_date {
            return Err(DomainError::validation("startDate must not be after endDate"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id,
            account_type,
            start_date,
            end_date,
            format,
            created_at: now,
        })
    }

    pub fn window(&self) -> StatementWindow {
        StatementWindow::from_dates(self.start_date, self.end_date)
    }
}

/// Half-open instant range `[start, end)` covering whole calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl StatementWindow {
    pub fn from_dates(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        let start = start_date.and_time(NaiveTime::MIN).and_utc();
        let end = end_date.and_time(NaiveTime::MIN).and_utc() + Duration::days(1);
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// Computed statement
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementReport {
    #[serde(flatten)]
    pub statement: Statement,
    pub transactions: Vec<Transaction>,
    pub starting_balance: Decimal,
    pub ending_balance: Decimal,
    pub currency: String,
}

/// Contribution of one transaction to the balance of `account_type`
pub fn signed_amount(transaction: &Transaction, account_type: AccountType) -> Decimal {
    if !transaction.affects_balance() {
        return Decimal::ZERO;
    }
    let amount = transaction.amount().value();
    match transaction.transaction_type() {
        TransactionType::Deposit | TransactionType::CryptoDeposit | TransactionType::ChequeDeposit => amount,
        TransactionType::Withdrawal | TransactionType::Transfer | TransactionType::Payment => -amount,
        TransactionType::LoanPayment if account_type == AccountType::Loan => -amount,
        TransactionType::LoanPayment => Decimal::ZERO,
    }
}

/// Most frequent currency among Completed transactions; ties go to the
/// lexicographically smallest name
pub fn dominant_currency<'a, I>(transactions: I) -> Option<String>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for tx in transactions {
        if tx.status() == TransactionStatus::Completed {
            *counts.entry(tx.currency()).or_insert(0) += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name.to_string())
}

fn replay<'a, I>(transactions: I, account_type: AccountType, currency: &str) -> Decimal
where
    I: IntoIterator<Item = &'a Transaction>,
{
    transactions
        .into_iter()
        .filter(|tx| tx.currency() == currency)
        .map(|tx| signed_amount(tx, account_type))
        .sum()
}

/// Build the report for `statement`.
///
/// `in_window` holds the Completed and Cancelled transactions of the window,
/// `prior` every transaction of the same account before the window starts.
/// Transactions in another currency than the dominant one are left out of
/// the balances.
pub fn build_report(
    statement: Statement,
    mut in_window: Vec<Transaction>,
    prior: &[Transaction],
    default_currency: &str,
) -> StatementReport {
    let account_type = statement.account_type;
    in_window.sort_by_key(|tx| (tx.created_at(), tx.id()));

    let currency = dominant_currency(&in_window)
        .or_else(|| dominant_currency(prior))
        .unwrap_or_else(|| default_currency.to_string());

    let starting_balance = replay(prior, account_type, &currency);
    let ending_balance = starting_balance + replay(&in_window, account_type, &currency);

    StatementReport {
        statement,
        transactions: in_window,
        starting_balance,
        ending_balance,
        currency,
    }
}
