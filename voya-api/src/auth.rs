use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

pub fn authenticate(bearer_token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        bearer_token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Authentication(e.to_string()))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn round_trips_claims() {
        let claims = Claims {
            sub: "user-1".to_string(),
            role: "guest".to_string(),
            exp: usize::MAX,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        let decoded = authenticate(&token, "secret").unwrap();
        assert_eq!(decoded.sub, "user-1");
        assert!(!decoded.is_admin());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = Claims {
            sub: "user-1".to_string(),
            role: "guest".to_string(),
            exp: usize::MAX,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(authenticate(&token, "other").is_err());
    }
}
