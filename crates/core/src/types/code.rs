//! Six-digit verification codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`VerificationCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    /// The input is not exactly six characters long.
    #[error("verification code must be {expected} digits")]
    WrongLength {
        /// Required number of digits.
        expected: usize,
    },
    /// The input contains something other than ASCII digits.
    #[error("verification code must contain only digits")]
    NonDigit,
}

/// A code emailed to a user to confirm an address or authorize a password
/// reset.
///
/// ```
/// use oxytoxin_core::VerificationCode;
///
/// let code = VerificationCode::parse("042917").unwrap();
/// assert!(code.matches(" 042917 "));
/// assert!(!code.matches("042918"));
/// assert!(VerificationCode::parse("12345").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Number of digits in a code.
    pub const LENGTH: usize = 6;

    /// Parse a code, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns a [`CodeError`] if the input is not six ASCII digits.
    pub fn parse(s: &str) -> Result<Self, CodeError> {
        let trimmed = s.trim();
        if trimmed.len() != Self::LENGTH {
            return Err(CodeError::WrongLength {
                expected: Self::LENGTH,
            });
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodeError::NonDigit);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Build a code from a number below one million, zero-padded.
    #[must_use]
    pub fn from_number(n: u32) -> Self {
        Self(format!("{:06}", n % 1_000_000))
    }

    /// Compare against user input.
    ///
    /// Every byte is examined regardless of where the first mismatch is.
    #[must_use]
    pub fn matches(&self, input: &str) -> bool {
        let input = input.trim().as_bytes();
        let expected = self.0.as_bytes();
        if input.len() != expected.len() {
            return false;
        }
        expected
            .iter()
            .zip(input)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VerificationCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VerificationCode> for String {
    fn from(code: VerificationCode) -> Self {
        code.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(VerificationCode::parse("123456").unwrap().as_str(), "123456");
        assert_eq!(
            VerificationCode::parse("12345"),
            Err(CodeError::WrongLength { expected: 6 })
        );
        assert_eq!(VerificationCode::parse("12a456"), Err(CodeError::NonDigit));
    }

    #[test]
    fn test_from_number_pads() {
        assert_eq!(VerificationCode::from_number(42).as_str(), "000042");
        assert_eq!(VerificationCode::from_number(999_999).as_str(), "999999");
    }

    #[test]
    fn test_matches_trims_input() {
        let code = VerificationCode::parse("654321").unwrap();
        assert!(code.matches("654321"));
        assert!(code.matches("\t654321\n"));
        assert!(!code.matches("654320"));
        assert!(!code.matches("6543210"));
        assert!(!code.matches(""));
    }
}
