use std::time::Duration;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error, warn};

use crate::auth::dto::{Claims, JwtKeys, TokenScope};
use crate::auth::repo::User;
use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        let algorithm = cfg.algorithm.parse::<Algorithm>().unwrap_or_else(|_| {
            warn!(algorithm = %cfg.algorithm, "unknown JWT algorithm, falling back to HS256");
            Algorithm::HS256
        });
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm,
            access_ttl: Duration::from_secs((cfg.access_ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes as u64) * 60),
            email_ttl: Duration::from_secs((cfg.email_ttl_minutes as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn sign_with_scope(&self, email: &str, scope: TokenScope) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match scope {
            TokenScope::AccessToken => self.access_ttl,
            TokenScope::RefreshToken => self.refresh_ttl,
            TokenScope::EmailToken => self.email_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: email.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            scope,
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)?;
        debug!(%email, scope = ?scope, "jwt signed");
        Ok(token)
    }

    pub fn create_access_token(&self, email: &str) -> anyhow::Result<String> {
        self.sign_with_scope(email, TokenScope::AccessToken)
    }

    pub fn create_refresh_token(&self, email: &str) -> anyhow::Result<String> {
        self.sign_with_scope(email, TokenScope::RefreshToken)
    }

    pub fn create_email_token(&self, email: &str) -> anyhow::Result<String> {
        self.sign_with_scope(email, TokenScope::EmailToken)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let validation = Validation::new(self.algorithm);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(email = %data.claims.sub, scope = ?data.claims.scope, "jwt verified");
        Ok(data.claims)
    }

    /// Subject of a refresh token. Wrong scope and broken/expired tokens
    /// surface as distinct 401s.
    pub fn decode_refresh_token(&self, token: &str) -> Result<String, ApiError> {
        let claims = self
            .verify(token)
            .map_err(|_| ApiError::unauthorized("Could not validate credentials"))?;
        if claims.scope != TokenScope::RefreshToken {
            return Err(ApiError::unauthorized("Invalid scope for token"));
        }
        Ok(claims.sub)
    }

    /// Subject of an email-confirmation token.
    pub fn get_email_from_token(&self, token: &str) -> Result<String, ApiError> {
        let claims = self
            .verify(token)
            .map_err(|_| ApiError::Validation("Invalid token for email verification".into()))?;
        if claims.scope != TokenScope::EmailToken {
            return Err(ApiError::unauthorized("Invalid scope for token"));
        }
        Ok(claims.sub)
    }
}

/// Authenticated caller, resolved per request from the bearer access token.
/// Every protected route takes this before touching a repository.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = match keys.verify(token) {
            Ok(c) => c,
            Err(_) => {
                warn!("invalid or expired access token");
                return Err(ApiError::unauthorized("Could not validate credentials"));
            }
        };

        if claims.scope != TokenScope::AccessToken {
            return Err(ApiError::unauthorized("Could not validate credentials"));
        }

        let user = User::find_by_email(&state.db, &claims.sub)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::unauthorized("Could not validate credentials"))?;

        Ok(CurrentUser(user))
    }
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}

#[cfg(test)]
mod jwt_tests {
    use super::*;
    use axum::http::StatusCode;

    fn make_keys() -> JwtKeys {
        JwtKeys::from(&JwtConfig {
            secret: "dev-secret".into(),
            algorithm: "HS256".into(),
            access_ttl_minutes: 15,
            refresh_ttl_minutes: 60 * 24 * 7,
            email_ttl_minutes: 60 * 24,
        })
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys();
        let token = keys.create_access_token("bj@gmail.com").expect("sign access");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, "bj@gmail.com");
        assert_eq!(claims.scope, TokenScope::AccessToken);
    }

    #[test]
    fn refresh_token_round_trips_through_decode() {
        let keys = make_keys();
        let token = keys.create_refresh_token("bj@gmail.com").expect("sign refresh");
        let email = keys.decode_refresh_token(&token).expect("decode refresh");
        assert_eq!(email, "bj@gmail.com");
    }

    #[test]
    fn decode_refresh_rejects_access_scope() {
        let keys = make_keys();
        let token = keys.create_access_token("bj@gmail.com").expect("sign access");
        let err = keys.decode_refresh_token(&token).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Invalid scope for token");
    }

    #[test]
    fn decode_refresh_rejects_garbage() {
        let keys = make_keys();
        let err = keys.decode_refresh_token("not-a-token").unwrap_err();
        assert_eq!(err.to_string(), "Could not validate credentials");
    }

    #[test]
    fn email_token_round_trips() {
        let keys = make_keys();
        let token = keys.create_email_token("bj@gmail.com").expect("sign email");
        let email = keys.get_email_from_token(&token).expect("decode email token");
        assert_eq!(email, "bj@gmail.com");
    }

    #[test]
    fn email_decode_has_dedicated_error() {
        let keys = make_keys();
        let err = keys.get_email_from_token("broken").unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_string(), "Invalid token for email verification");

        let access = keys.create_access_token("bj@gmail.com").expect("sign access");
        let err = keys.get_email_from_token(&access).unwrap_err();
        assert_eq!(err.to_string(), "Invalid scope for token");
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys();
        let past = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let claims = Claims {
            sub: "bj@gmail.com".into(),
            iat: past.unix_timestamp() as usize,
            exp: (past + TimeDuration::minutes(15)).unix_timestamp() as usize,
            scope: TokenScope::AccessToken,
        };
        let token = encode(&Header::new(keys.algorithm), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let keys = make_keys();
        let other = JwtKeys::from(&JwtConfig {
            secret: "other-secret".into(),
            algorithm: "HS256".into(),
            access_ttl_minutes: 15,
            refresh_ttl_minutes: 60,
            email_ttl_minutes: 60,
        });
        let token = keys.create_access_token("bj@gmail.com").expect("sign access");
        assert!(other.verify(&token).is_err());
    }
}

#[cfg(test)]
mod email_tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("bj@gmail.com"));
        assert!(is_valid_email("a.b+c@example.co.uk"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
    }
}
