//! Bearer token issuance and verification.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use quill_core::{Actor, Error, Id, Policy, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::rest::ApiError;
use crate::state::AppState;
use crate::ServerError;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub iss: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Id> {
        self.sub.parse().map_err(|_| Error::AuthenticationRequired)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Signs and checks HS256 tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &JwtConfig) -> std::result::Result<Self, ServerError> {
        if config.secret.is_empty() {
            return Err(ServerError::Config("jwt secret must not be empty".to_string()));
        }
        config.validate_lifetimes()?;
        Ok(TokenService {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_ttl: Duration::minutes(config.access_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_ttl_days),
        })
    }

    fn issue(&self, id: Id, username: &str, kind: TokenKind) -> Result<String> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now
            .checked_add_signed(ttl)
            .ok_or_else(|| Error::Internal(format!("{kind:?} token lifetime out of range")))?;
        let claims = Claims {
            sub: id.to_string(),
            username: username.to_string(),
            kind,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("failed to encode jwt: {e}")))
    }

    /// An access token and a refresh token for `actor`.
    pub fn issue_pair(&self, actor: &Actor) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.issue(actor.id, &actor.username, TokenKind::Access)?,
            refresh: self.issue(actor.id, &actor.username, TokenKind::Refresh)?,
        })
    }

    /// Check signature, issuer, expiry and kind.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                log::debug!("rejected token: {e}");
                Error::AuthenticationRequired
            })?
            .claims;
        if claims.kind != kind {
            log::debug!("expected a {kind:?} token, got {:?}", claims.kind);
            return Err(Error::AuthenticationRequired);
        }
        Ok(claims)
    }

    /// Trade a refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;
        self.issue(claims.user_id()?, &claims.username, TokenKind::Access)
    }
}

/// The token in an `Authorization: Bearer ...` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Who is calling, if anyone.
///
/// As an extractor, a missing token yields an anonymous identity while a
/// token that fails verification rejects the request.
#[derive(Clone, Debug, Default)]
pub struct Identity(pub Option<Actor>);

impl Identity {
    /// Apply `policy`'s coarse check and return the actor.
    pub fn actor_for(&self, policy: Policy) -> Result<Actor> {
        policy.has_permission(self.0.as_ref()).cloned()
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        Ok(Identity(state.identify(&parts.headers).await?))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    use super::*;

    fn service(secret: &str) -> TokenService {
        TokenService::new(&JwtConfig {
            secret: secret.to_string(),
            ..JwtConfig::default()
        })
        .unwrap()
    }

    fn alice() -> Actor {
        Actor {
            id: 7,
            username: "alice".to_string(),
            is_superuser: false,
            is_staff: true,
            permissions: BTreeSet::new(),
        }
    }

    #[test]
    fn access_tokens_verify() {
        let tokens = service("secret");
        let pair = tokens.issue_pair(&alice()).unwrap();
        let claims = tokens.verify(&pair.access, TokenKind::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iss, "quill");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let tokens = service("secret");
        let pair = tokens.issue_pair(&alice()).unwrap();
        assert_matches!(
            tokens.verify(&pair.refresh, TokenKind::Access),
            Err(Error::AuthenticationRequired)
        );
        assert_matches!(
            tokens.refresh(&pair.access),
            Err(Error::AuthenticationRequired)
        );
        let access = tokens.refresh(&pair.refresh).unwrap();
        assert!(tokens.verify(&access, TokenKind::Access).is_ok());
    }

    #[test]
    fn foreign_signatures_are_rejected() {
        let pair = service("one").issue_pair(&alice()).unwrap();
        assert_matches!(
            service("two").verify(&pair.access, TokenKind::Access),
            Err(Error::AuthenticationRequired)
        );
        assert!(service("one").verify("garbage", TokenKind::Access).is_err());
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        assert_matches!(
            TokenService::new(&JwtConfig::default()),
            Err(ServerError::Config(_))
        );
    }

    #[test]
    fn oversized_lifetimes_are_a_config_error() {
        let config = JwtConfig {
            secret: "secret".to_string(),
            refresh_ttl_days: 1_000_000_000,
            ..JwtConfig::default()
        };
        assert_matches!(TokenService::new(&config), Err(ServerError::Config(_)));
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
