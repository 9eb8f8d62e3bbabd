//! Identity & credential verification primitives
//!
//! Password hashing, OTP and opaque token generation, and the generators
//! for account and card numbers issued at registration.

pub mod numbers;
pub mod password;
pub mod token;

pub use numbers::{generate_account_number, generate_card_number, generate_cvc, MAX_GENERATION_ATTEMPTS};
pub use password::{hash_password, verify_password, PasswordError};
pub use token::{generate_otp, generate_token, sha256_hex};
