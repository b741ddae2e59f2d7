//! Signed, time-bound bearer tokens.
//!
//! Tokens are JWTs signed with exactly one algorithm, HMAC-SHA256. A token
//! whose header names any other algorithm is rejected before its signature
//! is even looked at.
//!
//! The secret is passed in by the caller; the codec never reads
//! configuration on its own.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::{SharedClock, SystemClock};

/// The only accepted signing algorithm.
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// Decoded token payload.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issued at (unix seconds).
    pub iat: u64,
    /// Not valid before (unix seconds).
    pub nbf: u64,
    /// Expires at (unix seconds).
    pub exp: u64,
    /// Issuer: the host the token was requested from.
    pub iss: String,
    /// Subject: the authenticated user id, as a decimal string.
    pub sub: String,
    /// Random per-token id.
    pub jti: String,
}

impl Claims {
    /// The subject as a user id. `None` unless it is a positive integer.
    pub fn subject_id(&self) -> Option<u64> {
        self.sub.parse().ok().filter(|id| *id > 0)
    }
}

/// Why a token was refused.
///
/// The distinction is for logs and tests only; the auth gate reports every
/// variant to clients with the same message.
#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("unsupported signing algorithm `{0}`")]
    Algorithm(String),

    #[error("signature does not match")]
    Signature,

    #[error("token has expired")]
    Expired,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("token was issued in the future")]
    IssuedInFuture,

    #[error("could not encode token: {0}")]
    Encode(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature  => Self::Signature,
            ErrorKind::ExpiredSignature  => Self::Expired,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            _                            => Self::Malformed,
        }
    }
}

/// Encodes and verifies HS256 tokens under one shared secret.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: SharedClock,
}

impl TokenCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: impl AsRef<[u8]>, clock: SharedClock) -> Self {
        let secret = secret.as_ref();
        // The time window is checked against `clock` in `decode`; the
        // library's own checks read the system time.
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            clock,
        }
    }

    /// Builds fresh claims for `subject` valid from now for `valid_for`
    /// seconds, and signs them.
    pub fn issue(&self, subject: u64, issuer: &str, valid_for: u64) -> Result<(String, Claims), TokenError> {
        let now = self.clock.now();
        let claims = Claims {
            iat: now,
            nbf: now,
            exp: now.saturating_add(valid_for),
            iss: issuer.to_owned(),
            sub: subject.to_string(),
            jti: hex::encode(rand::random::<[u8; 10]>()),
        };
        let token = self.encode(&claims)?;
        Ok((token, claims))
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(ALGORITHM), claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Verifies `token` and returns its claims.
    ///
    /// Checks, in order: shape, algorithm, signature, then the time window
    /// (`exp` strictly in the future, `nbf` and `iat` not in the future).
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| TokenError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Algorithm(format!("{:?}", header.alg)));
        }

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)?.claims;
        let now = self.clock.now();
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        if claims.nbf > now {
            return Err(TokenError::NotYetValid);
        }
        if claims.iat > now {
            return Err(TokenError::IssuedInFuture);
        }
        Ok(claims)
    }
}
