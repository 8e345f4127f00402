//! Token issuance and signature verification.
//!
//! The version check against the stored user lives in
//! [`crate::service::TokenAuthenticator`]; this module only knows about
//! signatures and clocks.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use rolegate_core::UserId;

use crate::claims::{validate_claims, TokenClaims, TokenValidationError};

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
/// One year.
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;
pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to encode token: {0}")]
    Encode(String),

    #[error("token lifetime must be between 1 and {} hours", MAX_TOKEN_TTL_HOURS)]
    InvalidLifetime,
}

/// Outcome of signature and clock checks on a raw token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    /// Bad signature, wrong algorithm, unparsable payload or impossible time
    /// window.
    Malformed,
    /// Signature fine, clock past `exp`.
    Expired,
    /// Signature and clock fine. Still subject to the version check.
    Decoded(TokenClaims),
}

/// A freshly minted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// HS256 token codec with an injected secret.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &Algorithm::HS256)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let secret = secret.as_ref();

        // Expiry is checked by `validate_claims` against the caller's clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Result<Self, TokenError> {
        if ttl <= Duration::zero() || ttl > Duration::hours(MAX_TOKEN_TTL_HOURS) {
            return Err(TokenError::InvalidLifetime);
        }
        self.ttl = ttl;
        Ok(self)
    }

    /// Mint a token for `user_id` carrying `token_version`.
    ///
    /// Callers bump the stored version first and pass the new value.
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub fn issue(
        &self,
        user_id: UserId,
        token_version: i64,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(TokenError::InvalidLifetime)?;
        let claims = TokenClaims {
            user_id,
            v: token_version,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let access_token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            token_type: TOKEN_TYPE,
            expires_at,
        })
    }

    /// Verify signature and time window. Never errors: every failure is a
    /// [`TokenState`].
    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> TokenState {
        let claims = match jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => data.claims,
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => return TokenState::Expired,
            Err(_) => return TokenState::Malformed,
        };

        match validate_claims(&claims, now) {
            Ok(()) => TokenState::Decoded(claims),
            Err(TokenValidationError::Expired) => TokenState::Expired,
            Err(TokenValidationError::NotYetValid | TokenValidationError::InvalidTimeWindow) => {
                TokenState::Malformed
            }
        }
    }
}
