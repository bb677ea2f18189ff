use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Verified identity claims carried by a bearer token.
///
/// Produced only by `TokenService::verify`; request-scoped and never
/// persisted. Tokens do not expire, so there is no `exp` claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token generation error: {0}")]
    Generation(String),
}

/// Issues and verifies signed identity tokens against a single shared secret.
///
/// The secret is injected at construction rather than read from ambient
/// config, so tests can run isolated services with distinct secrets.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Tokens carry no exp claim
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Sign a token for the given user.
    pub fn issue(&self, username: &str, is_admin: bool) -> Result<String, TokenError> {
        let claims = Claims {
            username: username.to_string(),
            is_admin,
            iat: Utc::now().timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    /// Decode and verify a token. Callers decide what an invalid token
    /// means; for request handling it means anonymous, not an error.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(token_data.claims)
    }
}

/// Extract the credential from an Authorization header, if any.
///
/// Accepts a case-insensitive "Bearer" scheme and tolerates extra whitespace
/// around the token. Anything else (missing header, other scheme, non-UTF8)
/// yields None.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, rest) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let tokens = TokenService::new("secret-test");
        let token = tokens.issue("test", false).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.username, "test");
        assert!(!claims.is_admin);
        assert!(claims.iat > 0);
    }

    #[test]
    fn issue_and_verify_admin() {
        let tokens = TokenService::new("secret-test");
        let token = tokens.issue("test", true).unwrap();
        assert!(tokens.verify(&token).unwrap().is_admin);
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let token = TokenService::new("wrong").issue("test", false).unwrap();
        assert!(TokenService::new("secret-test").verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_garbage() {
        let tokens = TokenService::new("secret-test");
        assert!(tokens.verify("not-a-token").is_err());
    }

    #[test]
    fn is_admin_defaults_to_false_when_claim_missing() {
        // A token minted without the isAdmin claim must not grant admin.
        let key = EncodingKey::from_secret(b"secret-test");
        let token = encode(
            &Header::default(),
            &serde_json::json!({ "username": "test", "iat": 1_700_000_000 }),
            &key,
        )
        .unwrap();

        let claims = TokenService::new("secret-test").verify(&token).unwrap();
        assert_eq!(claims.username, "test");
        assert!(!claims.is_admin);
    }

    #[test]
    fn bearer_token_strips_scheme() {
        let headers = headers_with("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token(&headers_with("bearer tok")), Some("tok"));
        assert_eq!(bearer_token(&headers_with("BEARER tok")), Some("tok"));
    }

    #[test]
    fn bearer_token_trims_whitespace() {
        assert_eq!(bearer_token(&headers_with("Bearer   tok  ")), Some("tok"));
    }

    #[test]
    fn non_bearer_schemes_are_ignored() {
        assert_eq!(bearer_token(&headers_with("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&headers_with("token-without-scheme")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
