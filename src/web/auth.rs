// Auth middleware: stateless HMAC-SHA256 tokens bound to a user ID.
//
// Token format: {user_id}.{timestamp_secs}.{nonce_hex}.{hmac_hex}
//
// The HMAC covers "{user_id}.{timestamp_secs}.{nonce_hex}" signed with
// BINARIED_SESSION_SECRET. Tokens are valid for SESSION_TTL_SECS (7 days).
//
// Where a token may come from, in order:
//   Authorization: Bearer <token>
//   binaried_session cookie (set on login/register)
//   ?token=<token> (event stream only; EventSource can't send headers)

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use super::{api_error, AppState, AuthUser};

type HmacSha256 = Hmac<Sha256>;

/// Session cookie name.
pub const COOKIE_NAME: &str = "binaried_session";

/// Token lifetime: 7 days.
pub const SESSION_TTL_SECS: u64 = 7 * 86_400;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Build a new token for `user_id` signed with `secret`.
pub fn create_token(secret: &str, user_id: &str) -> String {
    issue_token(secret, user_id, now_secs())
}

fn issue_token(secret: &str, user_id: &str, timestamp: u64) -> String {
    let mut nonce_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = hex::encode(nonce_bytes);

    let payload = format!("{user_id}.{timestamp}.{nonce}");
    let sig = hmac_sign(secret, &payload);

    format!("{payload}.{sig}")
}

/// Verify a token. Returns the user ID if the HMAC is valid and the token
/// is not older than `SESSION_TTL_SECS`.
pub fn verify_token(secret: &str, token: &str) -> Option<String> {
    let parts: Vec<&str> = token.split('.').collect();
    let [user_id, timestamp_str, nonce, provided_sig] = parts.as_slice() else {
        return None;
    };
    if user_id.is_empty() {
        return None;
    }

    let payload = format!("{user_id}.{timestamp_str}.{nonce}");
    let expected_sig = hmac_sign(secret, &payload);
    if !constant_time_eq(provided_sig, &expected_sig) {
        return None;
    }

    let timestamp = timestamp_str.parse::<u64>().ok()?;
    if now_secs().saturating_sub(timestamp) >= SESSION_TTL_SECS {
        return None;
    }
    Some(user_id.to_string())
}

/// Axum middleware: reject requests without a valid token with 401.
pub async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    authenticate(&state, request, next, false).await
}

/// Like `require_auth`, but also accepts `?token=` for the event stream.
pub async fn require_stream_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    authenticate(&state, request, next, true).await
}

async fn authenticate(state: &AppState, mut request: Request, next: Next, allow_query: bool) -> Response {
    let user_id = token_from_request(&request, allow_query)
        .and_then(|token| verify_token(&state.config.session_secret, &token));

    let Some(user_id) = user_id else {
        return api_error(StatusCode::UNAUTHORIZED, "Authentication required");
    };

    request.extensions_mut().insert(AuthUser { user_id });
    next.run(request).await
}

/// Build the `Set-Cookie` header value for a new session.
pub fn set_cookie_header(token: &str, secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!(
        "{COOKIE_NAME}={token}; HttpOnly{secure_flag}; SameSite=Lax; Path=/; Max-Age={SESSION_TTL_SECS}"
    )
}

/// Build the `Set-Cookie` header value that clears the session cookie.
pub fn clear_cookie_header() -> String {
    format!("{COOKIE_NAME}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

// --- Private helpers ---

fn hmac_sign(secret: &str, payload: &str) -> String {
    // HMAC accepts keys of any length, so this never fails in practice.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() || b.is_empty() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

fn token_from_request(request: &Request, allow_query: bool) -> Option<String> {
    let headers = request.headers();

    if let Some(bearer) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(bearer.trim().to_string());
    }

    if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        for pair in cookie_header.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name.trim() == COOKIE_NAME && !value.trim().is_empty() {
                    return Some(value.trim().to_string());
                }
            }
        }
    }

    if allow_query {
        // Tokens are hex, digits and dots, so no percent-decoding is needed.
        return request
            .uri()
            .query()
            .unwrap_or("")
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
            .map(str::to_string);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    const SECRET: &str = "test_secret_32_bytes_long_enough!";

    #[test]
    fn test_token_roundtrip() {
        let token = create_token(SECRET, "abc123");
        assert_eq!(verify_token(SECRET, &token).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token("correct_secret", "abc123");
        assert!(verify_token("wrong_secret", &token).is_none());
    }

    #[test]
    fn test_swapped_user_rejected() {
        let token = create_token(SECRET, "alice");
        let forged = token.replacen("alice", "mallory", 1);
        assert!(verify_token(SECRET, &forged).is_none());
    }

    #[test]
    fn test_expired_token_rejected() {
        let old = now_secs() - SESSION_TTL_SECS - 1;
        let token = issue_token(SECRET, "abc123", old);
        assert!(verify_token(SECRET, &token).is_none());

        let recent = now_secs() - SESSION_TTL_SECS + 60;
        let token = issue_token(SECRET, "abc123", recent);
        assert!(verify_token(SECRET, &token).is_some());
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(verify_token(SECRET, "not.a.valid.token.format").is_none());
        assert!(verify_token(SECRET, "").is_none());
        assert!(verify_token(SECRET, "only.three.parts").is_none());
    }

    #[test]
    fn test_token_sources() {
        let bearer = Request::builder()
            .uri("/api/auth/me")
            .header(header::AUTHORIZATION, "Bearer tok1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(token_from_request(&bearer, false).as_deref(), Some("tok1"));

        let cookie = Request::builder()
            .uri("/api/auth/me")
            .header(header::COOKIE, format!("theme=dark; {COOKIE_NAME}=tok2"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(token_from_request(&cookie, false).as_deref(), Some("tok2"));

        let query = Request::builder()
            .uri("/api/events?x=1&token=tok3")
            .body(Body::empty())
            .unwrap();
        assert_eq!(token_from_request(&query, false), None);
        assert_eq!(token_from_request(&query, true).as_deref(), Some("tok3"));
    }
}
