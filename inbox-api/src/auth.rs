use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    response::Response,
};
use inbox_core::InboxContext;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing;

/// JWT claims minted by the upstream identity service. Role and
/// permission policy stay with that service; this core only needs a
/// trustworthy user id for membership checks.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

fn extract_token(auth_header: Option<&str>) -> Option<String> {
    auth_header?
        .strip_prefix("Bearer ")
        .map(|s| s.trim().to_string())
}

pub fn verify_token(token: &str, secret: &str) -> Result<i64, StatusCode> {
    let decoding_key = DecodingKey::from_secret(secret.as_ref());
    let validation = Validation::default();

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(token_data) => Ok(token_data.claims.user_id),
        Err(e) => {
            tracing::debug!("JWT verification failed: {}", e);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

/// Bearer-token middleware for the authenticated API surface. Webhook
/// ingress authenticates with platform signatures instead and is
/// skipped here, as is the health check.
pub async fn auth_middleware(
    mut req: Request,
    next: axum::middleware::Next,
) -> Result<Response, StatusCode> {
    let path = req.uri().path();
    if path == "/health" || path.starts_with("/webhooks") {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match extract_token(auth_header) {
        Some(t) => t,
        None => {
            tracing::debug!("Missing Authorization header");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let ctx = req
        .extensions()
        .get::<InboxContext>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let user_id = verify_token(&token, &ctx.config.server.jwt_secret)?;

    req.extensions_mut().insert(AuthenticatedUser { user_id });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(user_id: i64, secret: &str, exp: usize) -> String {
        let claims = Claims { user_id, exp };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
        let token = token_for(42, "test-secret", exp);
        assert_eq!(verify_token(&token, "test-secret"), Ok(42));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let exp = (chrono::Utc::now().timestamp() + 3600) as usize;
        let token = token_for(42, "test-secret", exp);
        assert_eq!(
            verify_token(&token, "other-secret"),
            Err(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn test_expired_token_rejected() {
        let exp = (chrono::Utc::now().timestamp() - 3600) as usize;
        let token = token_for(42, "test-secret", exp);
        assert_eq!(
            verify_token(&token, "test-secret"),
            Err(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(
            extract_token(Some("Bearer abc.def.ghi")),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(extract_token(Some("Basic abc")), None);
        assert_eq!(extract_token(None), None);
    }
}
