use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid, // account id
    exp: i64,  // expiration timestamp
    iat: i64,  // issued at timestamp
}

/// Session verification against tokens issued by the external
/// authentication service. This core never issues or refreshes
/// credentials; it only reads the caller's account id out of the
/// `Authorization` header.
pub struct SessionService {
    jwt_secret: String,
}

impl SessionService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn verify_token(&self, token: &str) -> Result<Uuid, AppError> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token);

        let mut validation = jsonwebtoken::Validation::default();
        validation.leeway = 10;
        validation.validate_exp = true;
        validation.algorithms = vec![jsonwebtoken::Algorithm::HS256];

        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &jsonwebtoken::DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|err| {
            tracing::warn!("rejected session token: {err}");
            AppError::Unauthenticated
        })?;

        Ok(token_data.claims.sub)
    }

    /// Optional session for fail-open paths: any missing or invalid
    /// token reads as "no session".
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<Uuid> {
        let token = headers.get("Authorization")?.to_str().ok()?;
        self.verify_token(token).ok()
    }

    /// Strict session for mutation paths.
    pub fn require_session(&self, headers: &HeaderMap) -> Result<Uuid, AppError> {
        let token = match headers.get("Authorization").map(|token| token.to_str()) {
            Some(Ok(token)) => token,
            _ => return Err(AppError::Unauthenticated),
        };
        self.verify_token(token)
    }
}
