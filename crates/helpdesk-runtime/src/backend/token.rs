//! Access-token decoding for sessions handed to the client.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use helpdesk_core::auth::{Session, TokenClaims};
use helpdesk_core::error::HelpdeskError;

/// Token errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token expired")]
    TokenExpired,
}

impl From<TokenError> for HelpdeskError {
    fn from(err: TokenError) -> Self {
        HelpdeskError::Unauthorized(err.to_string())
    }
}

/// Decodes access tokens issued by the auth service.
///
/// Without a secret the signature is not checked: the client never holds the
/// service's signing key and the backend re-validates every bearer token.
/// Expiry is always checked.
#[derive(Clone)]
pub struct TokenDecoder {
    decoding_key: Option<DecodingKey>,
}

impl std::fmt::Debug for TokenDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDecoder")
            .field("verifies_signature", &self.decoding_key.is_some())
            .finish()
    }
}

impl TokenDecoder {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            decoding_key: secret
                .filter(|s| !s.is_empty())
                .map(|s| DecodingKey::from_secret(s.as_bytes())),
        }
    }

    /// Decoder that only parses claims and checks expiry.
    pub fn unverified() -> Self {
        Self::new(None)
    }

    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        match &self.decoding_key {
            Some(key) => Self::decode_with_verification(token, key),
            None => Self::decode_without_verification(token),
        }
    }

    /// Build a session from a token pair.
    pub fn session(&self, access_token: &str, refresh_token: &str) -> Result<Session, HelpdeskError> {
        let claims = self.decode(access_token)?;
        let user = claims.to_user()?;
        let expires_at = chrono::DateTime::from_timestamp(claims.exp, 0).ok_or_else(|| {
            HelpdeskError::Unauthorized(format!("Token expiry {} is out of range", claims.exp))
        })?;

        Ok(Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at,
            user,
        })
    }

    fn decode_with_verification(token: &str, key: &DecodingKey) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);

        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 60; // 60 seconds clock skew tolerance
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data =
            decode::<TokenClaims>(token, key, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    TokenError::InvalidToken("Invalid signature".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    TokenError::InvalidToken("Invalid token format".to_string())
                }
                jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim) => {
                    TokenError::InvalidToken(format!("Missing required claim: {}", claim))
                }
                _ => TokenError::InvalidToken(e.to_string()),
            })?;

        Ok(token_data.claims)
    }

    fn decode_without_verification(token: &str) -> Result<TokenClaims, TokenError> {
        let token_data =
            jsonwebtoken::dangerous::insecure_decode::<TokenClaims>(token).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::InvalidToken => {
                        TokenError::InvalidToken("Invalid token format".to_string())
                    }
                    _ => TokenError::InvalidToken(e.to_string()),
                }
            })?;

        if token_data.claims.is_expired() {
            return Err(TokenError::TokenExpired);
        }

        Ok(token_data.claims)
    }
}

/// Sign claims with an HMAC secret. Used by the in-memory auth service.
pub fn sign_claims(claims: &TokenClaims, secret: &str) -> Result<String, HelpdeskError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| HelpdeskError::Internal(format!("Failed to sign token: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::schema::Role;
    use uuid::Uuid;

    fn claims(duration_secs: i64) -> TokenClaims {
        TokenClaims::builder()
            .user_id(Uuid::new_v4())
            .email("agent@example.com")
            .role(Role::Agent)
            .duration_secs(duration_secs)
            .build()
            .unwrap()
    }

    #[test]
    fn test_valid_token_with_correct_secret() {
        let claims = claims(3600);
        let token = sign_claims(&claims, "test-secret").unwrap();

        let decoded = TokenDecoder::new(Some("test-secret")).decode(&token).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.role(), Some(Role::Agent));
    }

    #[test]
    fn test_valid_token_with_wrong_secret() {
        let token = sign_claims(&claims(3600), "wrong-secret").unwrap();

        match TokenDecoder::new(Some("correct-secret")).decode(&token) {
            Err(TokenError::InvalidToken(_)) => {}
            other => panic!("Expected InvalidToken error, got {:?}", other),
        }
    }

    #[test]
    fn test_unverified_decode_skips_signature() {
        let token = sign_claims(&claims(3600), "any-secret").unwrap();
        assert!(TokenDecoder::unverified().decode(&token).is_ok());
    }

    #[test]
    fn test_unverified_decode_accepts_any_algorithm() {
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims(3600),
            &EncodingKey::from_secret(b"service-key"),
        )
        .unwrap();
        let decoded = TokenDecoder::unverified().decode(&token).unwrap();
        assert_eq!(decoded.role(), Some(Role::Agent));
    }

    #[test]
    fn test_unverified_decode_still_checks_expiration() {
        let token = sign_claims(&claims(-3600), "any-secret").unwrap();
        match TokenDecoder::unverified().decode(&token) {
            Err(TokenError::TokenExpired) => {}
            other => panic!("Expected TokenExpired error, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(TokenDecoder::unverified().decode("not-a-jwt").is_err());
    }

    #[test]
    fn test_session_from_tokens() {
        let claims = claims(3600);
        let token = sign_claims(&claims, "s").unwrap();

        let session = TokenDecoder::unverified().session(&token, "refresh").unwrap();
        assert_eq!(Some(session.user.id), claims.user_id());
        assert_eq!(session.refresh_token, "refresh");
        assert_eq!(session.expires_at.timestamp(), claims.exp);
        assert!(!session.is_expired());
    }
}
