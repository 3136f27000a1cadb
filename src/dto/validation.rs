//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest PIN the API accepts before even consulting the verifier.
const MAX_PIN_LENGTH: usize = 16;

/// Validates that a submitted PIN is a short string of ASCII digits.
///
/// This bounds obviously malformed input; whether the PIN is correct stays
/// the verifier's call.
///
/// # Examples
///
/// ```ignore
/// validate_pin("1234")   // Ok
/// validate_pin("12 34")  // Err - whitespace
/// validate_pin("")       // Err - empty
/// ```
pub fn validate_pin(pin: &str) -> Result<(), ValidationError> {
    if pin.is_empty() || pin.len() > MAX_PIN_LENGTH {
        let mut err = ValidationError::new("pin_length");
        err.message =
            Some(format!("PIN must be 1 to {MAX_PIN_LENGTH} characters (got {})", pin.len()).into());
        return Err(err);
    }

    if !pin.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("pin_format");
        err.message = Some("PIN must contain only digits".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_pin_valid() {
        assert!(validate_pin("1234").is_ok());
        assert!(validate_pin("0000").is_ok());
        assert!(validate_pin("987654").is_ok());
    }

    #[test]
    fn test_validate_pin_invalid_length() {
        assert!(validate_pin("").is_err());
        assert!(validate_pin("12345678901234567").is_err()); // 17 digits
    }

    #[test]
    fn test_validate_pin_invalid_format() {
        assert!(validate_pin("12a4").is_err()); // letter
        assert!(validate_pin("12 4").is_err()); // space
        assert!(validate_pin("１２３４").is_err()); // full-width digits
        assert!(validate_pin("-123").is_err()); // sign
    }
}
