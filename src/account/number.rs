//! Account number generation
//!
//! Format: `branch (3 digits) + year (4 digits) + random (4 digits) + Luhn
//! check digit (1 digit)` — 12 digits total. Uniqueness is enforced by the
//! account store; callers regenerate on collision.

use chrono::{Datelike, Utc};
use rand::Rng;

/// Total length of a generated account number.
pub const ACCOUNT_NUMBER_LEN: usize = 12;

/// Generate a fresh 12-digit account number for the given branch.
pub fn generate(branch_code: &str) -> String {
    let year = Utc::now().year();
    let random_part: u32 = rand::thread_rng().gen_range(0..10_000);
    let raw = format!("{}{}{:04}", branch_code, year, random_part);
    let check = luhn_check_digit(&raw);
    format!("{}{}", raw, check)
}

/// Compute the Luhn check digit over a string of ASCII digits.
///
/// Doubles every second digit from the right, subtracts 9 when the doubled
/// value exceeds 9, sums everything: `(10 - sum % 10) % 10`.
pub fn luhn_check_digit(digits: &str) -> u32 {
    let mut sum = 0u32;
    let mut double = true;
    for ch in digits.chars().rev() {
        let mut n = ch.to_digit(10).unwrap_or(0);
        if double {
            n *= 2;
            if n > 9 {
                n -= 9;
            }
        }
        sum += n;
        double = !double;
    }
    (10 - sum % 10) % 10
}

/// Check that a 12-digit account number carries a valid check digit.
pub fn verify(account_number: &str) -> bool {
    if account_number.len() != ACCOUNT_NUMBER_LEN
        || !account_number.chars().all(|c| c.is_ascii_digit())
    {
        return false;
    }
    let (body, check) = account_number.split_at(ACCOUNT_NUMBER_LEN - 1);
    check
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .is_some_and(|d| d == luhn_check_digit(body))
}
