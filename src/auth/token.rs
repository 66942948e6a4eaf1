use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::Role;

/// Reset tokens are valid for one hour.
pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    PasswordReset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies HS256 tokens with the deployment secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, access_ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl: Duration::hours(access_ttl_hours),
        }
    }

    pub fn issue_access(&self, user_id: Uuid, role: Role) -> Result<String, ApiError> {
        self.sign(user_id, Some(role), TokenType::Access, self.access_ttl)
    }

    pub fn issue_reset(&self, user_id: Uuid) -> Result<String, ApiError> {
        self.sign(user_id, None, TokenType::PasswordReset, Duration::seconds(RESET_TOKEN_TTL_SECS))
    }

    fn sign(
        &self,
        user_id: Uuid,
        role: Option<Role>,
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            id: user_id,
            role,
            token_type,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verifies signature and expiry, then checks the token's purpose.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        if data.claims.token_type != expected {
            return Err(ApiError::Unauthorized("Invalid token type".to_string()));
        }
        Ok(data.claims)
    }

    #[cfg(test)]
    fn sign_with_expiry(&self, user_id: Uuid, token_type: TokenType, exp: i64) -> String {
        let claims = Claims {
            id: user_id,
            role: None,
            token_type,
            iat: exp - 3600,
            exp,
        };
        encode(&Header::default(), &claims, &self.encoding).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trips() {
        let signer = TokenSigner::new("test-secret", 24);
        let id = Uuid::new_v4();
        let token = signer.issue_access(id, Role::Doctor).unwrap();

        let claims = signer.verify(&token, TokenType::Access).unwrap();
        assert_eq!(claims.id, id);
        assert_eq!(claims.role, Some(Role::Doctor));
    }

    #[test]
    fn reset_token_is_not_an_access_token() {
        let signer = TokenSigner::new("test-secret", 24);
        let token = signer.issue_reset(Uuid::new_v4()).unwrap();

        let err = signer.verify(&token, TokenType::Access).unwrap_err();
        assert_eq!(err.to_string(), "Invalid token type");
        assert!(signer.verify(&token, TokenType::PasswordReset).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = TokenSigner::new("test-secret", 24);
        let two_hours_ago = (Utc::now() - Duration::hours(2)).timestamp();
        let token = signer.sign_with_expiry(Uuid::new_v4(), TokenType::PasswordReset, two_hours_ago);

        let err = signer.verify(&token, TokenType::PasswordReset).unwrap_err();
        assert_eq!(err.to_string(), "Token has expired");
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let ours = TokenSigner::new("test-secret", 24);
        let theirs = TokenSigner::new("other-secret", 24);
        let token = theirs.issue_access(Uuid::new_v4(), Role::Admin).unwrap();

        assert!(matches!(
            ours.verify(&token, TokenType::Access),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
