//! Synthetic credit card numbers

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Issuer prefixes: Visa and the classic Mastercard range
const ISSUER_PREFIXES: &[&str] = &["4", "51", "52", "53", "54", "55"];

const CARD_LENGTH: usize = 16;

/// Luhn check digit for a string of digits (check digit not included)
pub fn luhn_check_digit(payload: &str) -> u32 {
    let sum: u32 = payload
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    (10 - sum % 10) % 10
}

/// Whether a full card number passes the Luhn checksum
pub fn is_valid_luhn(number: &str) -> bool {
    if number.len() < 2 || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let (payload, check) = number.split_at(number.len() - 1);
    check
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .is_some_and(|d| d == luhn_check_digit(payload))
}

/// Issues card numbers that are unique within one generator run.
#[derive(Debug, Default)]
pub struct CardNumberIssuer {
    issued: HashSet<String>,
}

impl CardNumberIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a fresh 16-digit, Luhn-valid number never issued before
    pub fn issue<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        loop {
            let number = Self::draw(rng);
            if self.issued.insert(number.clone()) {
                return number;
            }
        }
    }

    pub fn issued_count(&self) -> usize {
        self.issued.len()
    }

    fn draw<R: Rng + ?Sized>(rng: &mut R) -> String {
        let prefix = ISSUER_PREFIXES.choose(rng).copied().unwrap_or("4");
        let mut payload = String::with_capacity(CARD_LENGTH);
        payload.push_str(prefix);
        while payload.len() < CARD_LENGTH - 1 {
            let digit: u8 = rng.gen_range(0..10);
            payload.push(char::from(b'0' + digit));
        }
        let check = luhn_check_digit(&payload);
        payload.push(char::from(b'0' + check as u8));
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_luhn_known_numbers() {
        assert!(is_valid_luhn("4111111111111111"));
        assert!(is_valid_luhn("5555555555554444"));
        assert!(!is_valid_luhn("4111111111111112"));
        assert!(!is_valid_luhn(""));
    }

    #[test]
    fn test_issued_numbers_are_unique_and_valid() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut issuer = CardNumberIssuer::new();

        let numbers: Vec<String> = (0..500).map(|_| issuer.issue(&mut rng)).collect();
        let unique: HashSet<&String> = numbers.iter().collect();

        assert_eq!(unique.len(), 500);
        assert_eq!(issuer.issued_count(), 500);
        for number in &numbers {
            assert_eq!(number.len(), 16);
            assert!(is_valid_luhn(number), "{number} fails Luhn");
        }
    }
}
