use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::auth::service::TokenIssuer;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_id: String,
    pub exp: usize,
}

/// HS256 session tokens.
pub struct JwtIssuer {
    secret: String,
    ttl_hours: u64,
}

impl JwtIssuer {
    pub fn new(secret: impl Into<String>, ttl_hours: u64) -> Self {
        JwtIssuer {
            secret: secret.into(),
            ttl_hours,
        }
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

impl TokenIssuer for JwtIssuer {
    fn issue(&self, identity: &str, internal_id: &str) -> anyhow::Result<String> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let claims = Claims {
            sub: identity.to_string(),
            user_id: internal_id.to_string(),
            exp: (now + self.ttl_hours * 3600) as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_verifies() {
        let issuer = JwtIssuer::new("test-secret", 1);
        let token = issuer.issue("a@x.com", "user-1").unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.user_id, "user-1");
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let token = JwtIssuer::new("one", 1).issue("a@x.com", "user-1").unwrap();
        assert!(JwtIssuer::new("two", 1).verify(&token).is_err());
    }
}
