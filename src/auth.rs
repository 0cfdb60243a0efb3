/// Authentication extractors and utilities
use crate::{api::middleware::extract_bearer_token, context::AppContext, error::VaultError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

/// Claims carried by caller tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Owner identity
    pub sub: String,
    pub exp: usize,
}

/// Resolved caller identity
///
/// `owner` is None for anonymous callers, which is only possible when
/// authentication is not required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub owner: Option<String>,
}

impl CallerIdentity {
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for CallerIdentity {
    type Rejection = VaultError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = &state.config.authentication;

        let Some(token) = extract_bearer_token(&parts.headers) else {
            if auth.required {
                return Err(VaultError::Authentication(
                    "Missing authorization header".to_string(),
                ));
            }
            return Ok(CallerIdentity { owner: None });
        };

        let secret = auth.jwt_secret.as_deref().ok_or_else(|| {
            VaultError::Authentication("Token authentication is not configured".to_string())
        })?;

        let claims = verify_jwt_token(&token, secret)?;
        tracing::debug!(owner = %claims.sub, "Authenticated caller");

        Ok(CallerIdentity {
            owner: Some(claims.sub),
        })
    }
}

/// Verify a JWT token with full validation
///
/// This performs:
/// 1. JWT signature verification
/// 2. Expiration checking
/// 3. Claims validation
pub fn verify_jwt_token(token: &str, jwt_secret: &str) -> Result<Claims, VaultError> {
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (5 minutes)
    validation.leeway = 300;

    let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        tracing::warn!("JWT verification failed: {}", e);
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                VaultError::Authentication("Token has expired".to_string())
            }
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                VaultError::Authentication("Invalid token signature".to_string())
            }
            _ => VaultError::Authentication(format!("Invalid token: {}", e)),
        }
    })?;

    if token_data.claims.sub.is_empty() {
        return Err(VaultError::Authentication(
            "Invalid token: empty 'sub' claim".to_string(),
        ));
    }

    Ok(token_data.claims)
}

#[cfg(test)]
pub(crate) fn issue_test_token(sub: &str, secret: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: sub.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
}
