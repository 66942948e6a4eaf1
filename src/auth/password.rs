use chrono::{DateTime, Utc};

use crate::error::ApiError;

pub fn hash(password: &str, cost: u32) -> Result<String, ApiError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Checks a presented reset token against the one stored on the user.
/// A consumed token is stored as `None` and never matches.
pub fn check_stored_reset_token(
    stored: Option<&str>,
    expires: Option<DateTime<Utc>>,
    presented: &str,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if stored != Some(presented) {
        return Err(ApiError::Unauthorized("Invalid reset token".to_string()));
    }
    match expires {
        Some(expires) if now <= expires => Ok(()),
        _ => Err(ApiError::Unauthorized("Reset token has expired".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn hashes_verify_only_their_password() {
        let hashed = hash("Secret123", 4).unwrap();
        assert!(hashed.starts_with("$2"));
        assert!(verify("Secret123", &hashed));
        assert!(!verify("secret123", &hashed));
        assert!(!verify("Secret123", "not-a-hash"));
    }

    #[test]
    fn matching_unexpired_token_is_accepted() {
        let now = Utc::now();
        assert!(check_stored_reset_token(Some("abc"), Some(now + Duration::minutes(30)), "abc", now).is_ok());
    }

    #[test]
    fn consumed_token_is_rejected() {
        let now = Utc::now();
        let err = check_stored_reset_token(None, None, "abc", now).unwrap_err();
        assert_eq!(err.to_string(), "Invalid reset token");
    }

    #[test]
    fn superseded_token_is_rejected() {
        let now = Utc::now();
        let err =
            check_stored_reset_token(Some("newer"), Some(now + Duration::minutes(30)), "abc", now).unwrap_err();
        assert_eq!(err.to_string(), "Invalid reset token");
    }

    #[test]
    fn token_older_than_an_hour_is_rejected() {
        let now = Utc::now();
        let err = check_stored_reset_token(Some("abc"), Some(now - Duration::minutes(1)), "abc", now).unwrap_err();
        assert_eq!(err.to_string(), "Reset token has expired");
    }
}
