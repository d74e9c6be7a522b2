//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest pseudo-identity accepted from clients.
const MAX_IDENTITY_LEN: usize = 64;

/// Validates that a value is not empty once surrounding whitespace is removed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates a pseudo-identity: 1 to 64 ASCII letters, digits, `_` or `-`.
///
/// # Examples
///
/// ```ignore
/// validate_identity("user_3f2a")   // Ok
/// validate_identity("user 3f2a")   // Err - whitespace
/// validate_identity("")            // Err - empty
/// ```
pub fn validate_identity(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_IDENTITY_LEN {
        let mut err = ValidationError::new("identity_length");
        err.message = Some(
            format!(
                "User ID must be between 1 and {MAX_IDENTITY_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        let mut err = ValidationError::new("identity_format");
        err.message = Some("User ID may only contain letters, digits, '_' and '-'".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identity_valid() {
        assert!(validate_identity("user_0b1c2d").is_ok());
        assert!(validate_identity("U1").is_ok());
        assert!(validate_identity("community-bot").is_ok());
    }

    #[test]
    fn test_validate_identity_invalid_length() {
        assert!(validate_identity("").is_err());
        assert!(validate_identity(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_identity_invalid_format() {
        assert!(validate_identity("user 1").is_err()); // whitespace
        assert!(validate_identity("user/1").is_err()); // path separator
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("hi").is_ok());
        assert!(validate_not_blank("   ").is_err());
    }
}
