use crate::errors::{AppError, Result};
use crate::models::auth::{AuthContext, Role};
use crate::services::jwt::JwtManager;
use tracing::debug;

/// Resolves bearer tokens into the caller's organization scope.
pub struct AuthService {
    jwt_manager: JwtManager,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self {
            jwt_manager: JwtManager::new(jwt_secret),
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<AuthContext> {
        let token_data = self.jwt_manager.validate_token(token)?;
        let ctx = AuthContext::try_from(token_data.claims)?;
        debug!(action = "token_validated", org_id = %ctx.org_id, user_id = %ctx.user_id);
        Ok(ctx)
    }

    /// Issues a token for an organization member; used by operators and tests.
    pub fn issue_token(&self, user_id: &str, org_id: &str, role: Role) -> Result<String> {
        if org_id.trim().is_empty() {
            return Err(AppError::ValidationError("Organization is required".to_string()));
        }
        self.jwt_manager.generate_token(user_id, org_id, role)
    }
}
