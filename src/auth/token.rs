//! Bearer Token Validation and (Dev-Mode) Issuance
//!
//! Tokens are compact HMAC-SHA256-signed JWTs whose `sub` claim carries
//! the room id a peer is authorized to join. The signing algorithm is
//! pinned to HS256 so a token forged with e.g. RS256 is rejected before
//! signature verification is even attempted.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Lifetime of a dev-mode-issued token.
const DEV_TOKEN_LIFETIME_SECONDS: i64 = 120;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    #[serde(default)]
    #[allow(dead_code)]
    nbf: Option<usize>,
    #[serde(default)]
    #[allow(dead_code)]
    iat: Option<usize>,
}

#[derive(Debug, Serialize)]
struct DevClaims {
    sub: String,
    exp: usize,
    iat: usize,
}

/// A function that resolves the symmetric key to verify a token with,
/// given the client-supplied `token_hint`. Modeled as an explicit
/// parameter (rather than a captured global) so this function stays
/// testable with synthetic keys.
pub trait KeyFetcher {
    /// Resolve the HMAC key for the given hint.
    fn fetch(&self, hint: &str) -> Result<Vec<u8>, AuthError>;
}

impl<F> KeyFetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>, AuthError>,
{
    fn fetch(&self, hint: &str) -> Result<Vec<u8>, AuthError> {
        self(hint)
    }
}

/// Validate a compact bearer token and return the room id it authorizes.
///
/// Rejects tokens signed with anything other than HMAC-SHA256, tokens
/// whose key the `key_fetcher` cannot resolve, tokens with a bad
/// signature, and tokens that are expired or not yet valid.
pub fn validate_token_and_get_room_id(
    token: &str,
    hint: &str,
    key_fetcher: &impl KeyFetcher,
) -> Result<String, AuthError> {
    let header = jsonwebtoken::decode_header(token).map_err(|_| AuthError::MalformedToken)?;
    if header.alg != Algorithm::HS256 {
        return Err(AuthError::UnsupportedAlgorithm);
    }

    let key_bytes = key_fetcher.fetch(hint)?;
    let decoding_key = DecodingKey::from_secret(&key_bytes);

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation.validate_nbf = true;

    let data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => AuthError::InvalidSignature,
        _ => AuthError::MalformedToken,
    })?;

    Ok(data.claims.sub)
}

/// Sign a fresh short-lived token for `room_id`. Dev mode only.
pub fn sign_dev_token(room_id: &str, key: &[u8]) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = DevClaims {
        sub: room_id.to_string(),
        exp: (now + Duration::seconds(DEV_TOKEN_LIFETIME_SECONDS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    let encoding_key = EncodingKey::from_secret(key);
    encode(&Header::new(Algorithm::HS256), &claims, &encoding_key)
        .map_err(|e| AuthError::KeyFetch(e.to_string()))
}

/// A key fetcher that ignores the hint and always returns the single
/// process-wide key. This deployment has no per-hint key rotation, but
/// the hint is still threaded through so a future multi-key deployment
/// only has to change this one function.
pub fn single_key_fetcher(key: Vec<u8>) -> impl Fn(&str) -> Result<Vec<u8>, AuthError> {
    move |_hint: &str| Ok(key.clone())
}
