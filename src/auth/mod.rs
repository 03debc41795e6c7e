//! Magic-link login and cookie sessions.
//!
//! There is no email service wired up; the generated link is written to the
//! log instead. The token itself becomes the session cookie value after the
//! login hop, so session checks re-verify it without consuming it.

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use crate::db::DatabaseOperations;
use crate::models::AppState;

pub const SESSION_COOKIE: &str = "session";
const SESSION_MAX_AGE_SECS: u32 = 86400;

pub fn create_magic_token() -> String {
    format!("magic_{}", Uuid::new_v4().simple())
}

/// Value of the `session` cookie, if the request carries one.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("session="))
        .map(str::to_string)
}

pub fn set_session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; Max-Age={SESSION_MAX_AGE_SECS}; Path=/")
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; Max-Age=0; Path=/")
}

/// Resolve the logged-in user's email from the session cookie, re-checking
/// the token against the database. `None` for anonymous or stale sessions.
pub async fn session_email(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let token = session_cookie(headers)?;
    DatabaseOperations::verify_magic_link(&state.pool, &token, false)
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_magic_token_format() {
        let token = create_magic_token();
        assert!(token.starts_with("magic_"));
        assert_eq!(token.len(), "magic_".len() + 32);
        assert_ne!(token, create_magic_token());
    }

    #[test]
    fn test_session_cookie_parsing() {
        let mut headers = HeaderMap::new();
        assert!(session_cookie(&headers).is_none());

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=magic_abc123; other=1"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("magic_abc123"));
    }

    #[test]
    fn test_set_cookie_attributes() {
        let cookie = set_session_cookie("magic_abc");
        assert!(cookie.contains("session=magic_abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=86400"));

        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}
