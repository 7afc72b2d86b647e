use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT_SECRET is not defined")]
    MissingSecret,
    #[error("invalid JWT_EXPIRES_IN")]
    InvalidExpiresIn,
    #[error("token encoding failed")]
    Encoding,
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, cost)?)
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}

/// Issues an HS256 JWT carrying `userId` and `role`.
pub fn sign_token(config: &AuthConfig, user_id: &str, role: Role) -> Result<String, AuthError> {
    let secret = config.jwt_secret.as_deref().ok_or(AuthError::MissingSecret)?;
    let expires_in_ms = parse_expires_in_ms(&config.jwt_expires_in)?;

    let issued_at = Utc::now();
    let exp = issued_at
        .checked_add_signed(chrono::Duration::milliseconds(expires_in_ms))
        .ok_or(AuthError::InvalidExpiresIn)?;

    let header_json = serde_json::json!({
        "alg": "HS256",
        "typ": "JWT",
    });

    let payload_json = serde_json::json!({
        "userId": user_id,
        "role": role.as_str(),
        "iat": issued_at.timestamp(),
        "exp": exp.timestamp(),
    });

    let header_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header_json).map_err(|_| AuthError::Encoding)?);
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload_json).map_err(|_| AuthError::Encoding)?);
    let signing_input = format!("{header_b64}.{payload_b64}");

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::Encoding)?;
    mac.update(signing_input.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{sig_b64}"))
}

pub fn parse_expires_in_ms(value: &str) -> Result<i64, AuthError> {
    let trimmed = value.trim();
    let (split, unit) = trimmed.char_indices().last().ok_or(AuthError::InvalidExpiresIn)?;
    let digits = &trimmed[..split];

    let amount: i64 = digits.parse().map_err(|_| AuthError::InvalidExpiresIn)?;
    if amount <= 0 {
        return Err(AuthError::InvalidExpiresIn);
    }

    let unit_ms: i64 = match unit {
        's' => 1000,
        'm' => 60 * 1000,
        'h' => 60 * 60 * 1000,
        'd' => 24 * 60 * 60 * 1000,
        _ => return Err(AuthError::InvalidExpiresIn),
    };
    amount.checked_mul(unit_ms).ok_or(AuthError::InvalidExpiresIn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: Some("test-secret".to_string()),
            jwt_expires_in: "7d".to_string(),
            bcrypt_cost: 4,
        }
    }

    #[test]
    fn test_parse_expires_in() {
        assert_eq!(parse_expires_in_ms("30s").unwrap(), 30_000);
        assert_eq!(parse_expires_in_ms("7d").unwrap(), 604_800_000);
        assert!(parse_expires_in_ms("7w").is_err());
        assert!(parse_expires_in_ms("0h").is_err());
        assert!(parse_expires_in_ms("d").is_err());
        assert!(parse_expires_in_ms("").is_err());
    }

    #[test]
    fn test_parse_expires_in_rejects_multibyte_unit_and_overflow() {
        assert!(parse_expires_in_ms("7é").is_err());
        assert!(parse_expires_in_ms("é").is_err());
        assert!(parse_expires_in_ms(&format!("{}d", i64::MAX / 1000)).is_err());
        assert_eq!(parse_expires_in_ms(" 2m ").unwrap(), 120_000);
    }

    #[test]
    fn test_token_signature_and_claims() {
        let token = sign_token(&config(), "learner-1", Role::Student).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let mut mac = HmacSha256::new_from_slice(b"test-secret").unwrap();
        mac.update(format!("{}.{}", parts[0], parts[1]).as_bytes());
        let sig = URL_SAFE_NO_PAD.decode(parts[2]).unwrap();
        mac.verify_slice(&sig).unwrap();

        let payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(payload["userId"], "learner-1");
        assert_eq!(payload["role"], "student");
        let lifetime = payload["exp"].as_i64().unwrap() - payload["iat"].as_i64().unwrap();
        assert_eq!(lifetime, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_missing_secret() {
        let mut cfg = config();
        cfg.jwt_secret = None;
        assert!(matches!(
            sign_token(&cfg, "x", Role::Teacher),
            Err(AuthError::MissingSecret)
        ));
    }

    #[test]
    fn test_password_hash_verifies() {
        let hash = hash_password("secret1", 4).unwrap();
        assert!(verify_password("secret1", &hash));
        assert!(!verify_password("secret2", &hash));
    }
}
