use chrono::{Utc, Duration};
use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey, Algorithm};
use serde::{Serialize, Deserialize};
use crate::error::AppError;

pub const TOKEN_TTL_HOURS: i64 = 8;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
    pub username: String,
}

pub fn sign_token(user_id: i64, role: &str, username: &str, secret: &str) -> Result<String, AppError> {
    let now = Utc::now();
    let exp = now + Duration::hours(TOKEN_TTL_HOURS);
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
        username: username.to_string(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::internal(format!("Token signing failed: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256)
    )
    .map(|d| d.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = sign_token(42, "cashier", "ana", "test-secret").unwrap();
        let claims = verify_token(&token, "test-secret").unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, "cashier");
        assert_eq!(claims.username, "ana");
        assert_eq!(claims.exp - claims.iat, (TOKEN_TTL_HOURS * 3600) as usize);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = sign_token(1, "manager", "boss", "right").unwrap();
        assert!(verify_token(&token, "wrong").is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(verify_token("not.a.token", "secret").is_err());
    }
}
