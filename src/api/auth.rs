//! Authentication middleware for the REST API
//!
//! Provides optional HTTP Basic authentication for protected routes.
//! When ApiConfig::accounts is non-empty, requests must carry an
//! `Authorization: Basic ...` header naming one of the accounts or they
//! receive a 401 Unauthorized response with a Basic challenge.

use crate::error::ApiError;
use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use std::collections::HashMap;
use std::sync::Arc;

/// Challenge sent with every 401
pub const BASIC_REALM: &str = r#"Basic realm="Authorization Required""#;

/// Accounts accepted by [`require_basic_auth`], user name to password
pub type Accounts = Arc<HashMap<String, String>>;

/// Authentication middleware that checks HTTP Basic credentials against the accounts map
///
/// # Returns
///
/// Returns either:
/// - 401 Unauthorized if credentials are missing, malformed or wrong
/// - The response from the next handler if authentication succeeds
///
/// An empty accounts map lets every request through.
///
/// # Examples
///
/// ```no_run
/// use axum::{Router, middleware};
/// use std::collections::HashMap;
/// use std::sync::Arc;
/// use torrent_export::api::auth::require_basic_auth;
///
/// let accounts = Arc::new(HashMap::from([("admin".to_string(), "secret".to_string())]));
/// let router: Router = Router::new()
///     .layer(middleware::from_fn_with_state(accounts, require_basic_auth));
/// ```
pub async fn require_basic_auth(
    State(accounts): State<Accounts>,
    request: Request,
    next: Next,
) -> Response {
    if accounts.is_empty() {
        return next.run(request).await;
    }

    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_basic_credentials);

    match credentials {
        Some((user, password)) if account_matches(&accounts, &user, &password) => {
            next.run(request).await
        }
        Some((user, _)) => {
            tracing::warn!(user = %user, "rejected basic credentials");
            unauthorized_response("Invalid credentials")
        }
        None => unauthorized_response("Missing basic credentials"),
    }
}

/// Split `Basic <base64(user:password)>` into user and password
fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = BASE64_STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    // passwords may contain ':', user names may not
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

fn account_matches(accounts: &HashMap<String, String>, user: &str, password: &str) -> bool {
    accounts
        .get(user)
        .is_some_and(|expected| constant_time_eq(password.as_bytes(), expected.as_bytes()))
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
/// Always compares all bytes regardless of where the first mismatch occurs.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// 401 with the Basic challenge and a JSON error body
fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_REALM))],
        Json(ApiError::unauthorized(message)),
    )
        .into_response()
}
