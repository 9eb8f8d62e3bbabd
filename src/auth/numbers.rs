//! Account, card and CVC number generation
//!
//! Uniqueness is checked by the caller against the database; these only
//! produce well-formed candidates.

use rand::Rng;

/// Candidates tried before registration gives up
pub const MAX_GENERATION_ATTEMPTS: usize = 10;

fn digits(rng: &mut impl Rng, len: usize) -> String {
    (0..len).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

/// 11 digits without a leading zero
pub fn generate_account_number() -> String {
    let mut rng = rand::thread_rng();
    let first = char::from(b'0' + rng.gen_range(1..10u8));
    format!("{}{}", first, digits(&mut rng, 10))
}

/// 16 digits with a valid Luhn check digit
pub fn generate_card_number() -> String {
    let mut rng = rand::thread_rng();
    let body = format!("4{}", digits(&mut rng, 14));
    let check = luhn_check_digit(&body);
    format!("{}{}", body, check)
}

pub fn generate_cvc() -> String {
    digits(&mut rand::thread_rng(), 3)
}

fn luhn_check_digit(body: &str) -> u32 {
    let sum: u32 = body
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    (10 - sum % 10) % 10
}

/// Luhn validation of a full card number
pub fn is_luhn_valid(number: &str) -> bool {
    if number.len() < 2 || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let (body, check) = number.split_at(number.len() - 1);
    check.parse::<u32>().ok() == Some(luhn_check_digit(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_number_shape() {
        for _ in 0..200 {
            let number = generate_account_number();
            assert_eq!(number.len(), 11);
            assert!(number.chars().all(|c| c.is_ascii_digit()));
            assert!(!number.starts_with('0'));
        }
    }

    #[test]
    fn test_card_number_is_luhn_valid() {
        for _ in 0..200 {
            let card = generate_card_number();
            assert_eq!(card.len(), 16);
            assert!(is_luhn_valid(&card));
        }
        assert!(is_luhn_valid("4111111111111111"));
        assert!(!is_luhn_valid("4111111111111112"));
    }

    #[test]
    fn test_cvc_shape() {
        let cvc = generate_cvc();
        assert_eq!(cvc.len(), 3);
        assert!(cvc.chars().all(|c| c.is_ascii_digit()));
    }
}
