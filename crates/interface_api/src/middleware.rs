//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{info, warn};

use crate::auth::{permissions, require_role, Claims};
use crate::AppState;

/// Role needed for a request: reads need `ledger:read`, writes under
/// `/settings` need `settings:write`, other writes need `ledger:write`
fn required_role(method: &Method, path: &str) -> &'static str {
    if method == Method::GET || method == Method::HEAD {
        permissions::LEDGER_READ
    } else if path.contains("/settings") {
        permissions::SETTINGS_WRITE
    } else {
        permissions::LEDGER_WRITE
    }
}

/// Authentication middleware
///
/// Validates JWT tokens, checks the route's role and stores the claims in
/// the request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => {
            warn!("Missing or invalid Authorization header");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let claims = crate::auth::validate_token(token, &state.config.jwt_secret).map_err(|e| {
        warn!("Token validation failed: {:?}", e);
        StatusCode::UNAUTHORIZED
    })?;

    let role = required_role(request.method(), request.uri().path());
    if let Err(e) = require_role(&claims, role) {
        warn!(user = %claims.sub, "{}", e);
        return Err(StatusCode::FORBIDDEN);
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Audit logging middleware
///
/// Logs every API request with the acting user
pub async fn audit_middleware(
    State(_state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_id = request
        .extensions()
        .get::<Claims>()
        .map(|c| c.sub.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        user = %user_id,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_roles() {
        assert_eq!(required_role(&Method::GET, "/accounts"), permissions::LEDGER_READ);
        assert_eq!(required_role(&Method::POST, "/invoices"), permissions::LEDGER_WRITE);
        assert_eq!(required_role(&Method::PUT, "/invoices/x/status"), permissions::LEDGER_WRITE);
        assert_eq!(required_role(&Method::GET, "/settings"), permissions::LEDGER_READ);
        assert_eq!(
            required_role(&Method::POST, "/settings/test-email"),
            permissions::SETTINGS_WRITE
        );
    }
}
