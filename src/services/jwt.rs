use crate::errors::{AppError, Result};
use crate::models::auth::{AuthContext, Role};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,    // user id
    pub org_id: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

pub struct JwtManager {
    secret: String,
}

impl JwtManager {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    pub fn generate_token(&self, user_id: &str, org_id: &str, role: Role) -> Result<String> {
        let now = Utc::now();
        let expiration = now + Duration::hours(24);

        let claims = Claims {
            sub: user_id.to_string(),
            org_id: org_id.to_string(),
            role: role.as_str().to_string(),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| AppError::InternalError(format!("Failed to generate token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    }
}

impl TryFrom<Claims> for AuthContext {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self> {
        if claims.org_id.trim().is_empty() {
            return Err(AppError::Unauthorized("Token carries no organization".to_string()));
        }
        if claims.sub.trim().is_empty() {
            return Err(AppError::Unauthorized("Token carries no user".to_string()));
        }

        Ok(Self {
            role: claims.role.parse()?,
            org_id: claims.org_id,
            user_id: claims.sub,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_yields_context() {
        let manager = JwtManager::new("test-secret".to_string());
        let token = manager.generate_token("user_1", "org_1", Role::Admin).unwrap();

        let claims = manager.validate_token(&token).unwrap().claims;
        let ctx = AuthContext::try_from(claims).unwrap();
        assert_eq!(ctx.org_id, "org_1");
        assert_eq!(ctx.user_id, "user_1");
        assert_eq!(ctx.role, Role::Admin);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = JwtManager::new("a".to_string())
            .generate_token("user_1", "org_1", Role::BasicMember)
            .unwrap();
        let result = JwtManager::new("b".to_string()).validate_token(&token);
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_missing_org_is_rejected() {
        let claims = Claims {
            sub: "user_1".to_string(),
            org_id: String::new(),
            role: "admin".to_string(),
            exp: 0,
            iat: 0,
            jti: String::new(),
        };
        assert!(matches!(AuthContext::try_from(claims), Err(AppError::Unauthorized(_))));
    }
}
