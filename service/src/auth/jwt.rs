//! Bearer token issuance and verification (spec.md §6), mirroring
//! `sign/auth/jwt.py`.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid or expired token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// The token payload: `{user_id, email, exp}` (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub exp: i64,
}

pub struct TokenResponse {
    pub token: String,
    pub user_id: i64,
    pub exp: i64,
}

pub struct Jwt {
    secret: String,
    expire_minutes: i64,
    algorithm: Algorithm,
}

impl Jwt {
    pub fn new(secret: impl Into<String>, expire_minutes: i64, algorithm: &str) -> Result<Self, Error> {
        let algorithm = parse_algorithm(algorithm)?;
        Ok(Self { secret: secret.into(), expire_minutes, algorithm })
    }

    pub fn encode(&self, user_id: i64, email: &str) -> Result<TokenResponse, Error> {
        let exp = unix_now() + self.expire_minutes * 60;
        let claims = Claims { user_id, email: email.to_string(), exp };
        let header = Header::new(self.algorithm);
        let token = jsonwebtoken::encode(&header, &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(Error::Invalid)?;
        Ok(TokenResponse { token, user_id, exp })
    }

    pub fn decode(&self, token: &str) -> Result<Claims, Error> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(Error::Invalid)?;
        Ok(data.claims)
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm, Error> {
    match name {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(Error::UnsupportedAlgorithm(other.to_string())),
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Parses the `Authorization` header per spec.md §6: either the raw
/// token or `"Bearer <token>"`; if whitespace is present, the part
/// after the last space is taken.
pub fn extract_bearer_token(header: &str) -> &str {
    match header.rsplit(' ').next() {
        Some(tail) if !tail.is_empty() => tail,
        _ => header,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_claims() {
        let jwt = Jwt::new("secret", 30, "HS256").unwrap();
        let issued = jwt.encode(7, "test@test.ru").unwrap();
        let claims = jwt.decode(&issued.token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.email, "test@test.ru");
    }

    #[test]
    fn extracts_token_after_last_space() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), "abc.def.ghi");
        assert_eq!(extract_bearer_token("abc.def.ghi"), "abc.def.ghi");
    }

    #[test]
    fn rejects_unknown_algorithm() {
        assert!(matches!(Jwt::new("s", 1, "none"), Err(Error::UnsupportedAlgorithm(_))));
    }
}
