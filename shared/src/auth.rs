use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use log::warn;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Shared-secret HS256 verification. Token issuance belongs to the
/// identity platform; this service only checks signatures.
static JWT_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("JWT_SECRET").unwrap_or_else(|_| "hearth-dev-secret".to_string()));

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated user id.
    pub sub: String,
    pub exp: usize,
}

/// Extracts and verifies the bearer token, then exposes the authenticated
/// user id to handlers as an `Extension<String>`.
pub async fn auth_middleware(mut req: Request, next: Next) -> Response {
    let token = match bearer_token(&req) {
        Some(token) => token,
        None => {
            warn!(
                "Rejecting request without bearer token: {} {}",
                req.method(),
                req.uri()
            );
            return unauthorized("Missing authorization token");
        }
    };

    let decoding_key = DecodingKey::from_secret(JWT_SECRET.as_bytes());
    match decode::<Claims>(token, &decoding_key, &Validation::default()) {
        Ok(data) => {
            req.extensions_mut().insert(data.claims.sub);
            next.run(req).await
        }
        Err(e) => {
            warn!("Rejecting request with invalid token: {}", e);
            unauthorized("Invalid authorization token")
        }
    }
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

#[cfg(feature = "test_utils")]
pub use test_request::create_test_request;

#[cfg(feature = "test_utils")]
mod test_request {
    use super::{Claims, JWT_SECRET};
    use axum::body::Body;
    use http::{header, Request};
    use jsonwebtoken::{encode, EncodingKey, Header};

    /// Builds a request carrying a bearer token for `user_id`, signed with
    /// the same secret the middleware verifies against.
    pub fn create_test_request(
        method: &str,
        path: &str,
        user_id: &str,
        body: Option<serde_json::Value>,
    ) -> Request<Body> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("failed to sign test token");

        Request::builder()
            .method(method)
            .uri(path)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(match body {
                Some(value) => Body::from(value.to_string()),
                None => Body::empty(),
            })
            .expect("failed to build test request")
    }
}
