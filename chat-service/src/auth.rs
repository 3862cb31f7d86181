use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, Error, FromRequest, HttpRequest};
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject - the user id
    pub exp: i64,    // expiration time (unix timestamp)
}

/// Turns a bearer credential into a trusted subject identity.
///
/// The gateway must not depend on how validation happens: the default
/// implementation verifies signature and expiry locally against a shared
/// secret, but a remote round trip to an authentication service satisfies
/// the same contract.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<Claims, AppError>;
}

/// Local HS256 validation against a shared secret.
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl TokenValidator for JwtValidator {
    async fn validate(&self, token: &str) -> Result<Claims, AppError> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(_) => Err(AppError::Unauthorized),
        }
    }
}

/// Validate a bearer credential with a bounded wait.
///
/// A validator that does not answer within `timeout` is treated exactly like
/// a validation failure: the connection attempt is rejected, never left
/// half-open.
pub async fn authenticate(
    validator: &Arc<dyn TokenValidator>,
    timeout: Duration,
    token: &str,
) -> Result<Claims, AppError> {
    match tokio::time::timeout(timeout, validator.validate(token)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("token validation timed out after {:?}", timeout);
            Err(AppError::Unauthorized)
        }
    }
}

/// Authenticated user extracted from the `Authorization: Bearer` header.
///
/// The identity always comes from the validated token's subject claim,
/// never from path or query data.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string());

        Box::pin(async move {
            let state = state.ok_or(AppError::Internal)?;
            let token = token.ok_or(AppError::Unauthorized)?;
            let claims =
                authenticate(&state.validator, state.config.auth_timeout, &token).await?;
            Ok(AuthenticatedUser { id: claims.sub })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn sign(secret: &str, sub: &str, exp: i64) -> String {
        encode(
            &Header::default(),
            &Claims {
                sub: sub.to_string(),
                exp,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_token() {
        let validator = JwtValidator::new("secret");
        let token = sign("secret", "alice", chrono::Utc::now().timestamp() + 3600);

        let claims = validator.validate(&token).await.unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[tokio::test]
    async fn rejects_garbage_token() {
        let validator = JwtValidator::new("secret");
        assert!(validator.validate("not-a-jwt").await.is_err());
    }

    #[tokio::test]
    async fn rejects_wrong_secret() {
        let validator = JwtValidator::new("secret");
        let token = sign("other-secret", "alice", chrono::Utc::now().timestamp() + 3600);
        assert!(validator.validate(&token).await.is_err());
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let validator = JwtValidator::new("secret");
        let token = sign("secret", "alice", chrono::Utc::now().timestamp() - 3600);
        assert!(validator.validate(&token).await.is_err());
    }
}
