//! Repository module
//!
//! Row mapping and SQL for every table. Functions take a `PgConnection` so
//! the caller decides the transaction boundary; mutating flows pass the
//! connection of one open database transaction to every call.

pub mod currencies;
mod error;
pub mod loans;
pub mod sessions;
pub mod statements;
pub mod transactions;
pub mod users;

pub use currencies::Currency;
pub use error::RepositoryError;

pub type RepositoryResult<T> = Result<T, RepositoryError>;
