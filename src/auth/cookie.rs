//! Session cookie issued on login by the consolidated server

use crate::config::AuthConfig;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Matches the browser lifetime of the login session.
const SESSION_MAX_AGE_SECS: i64 = 60 * 60;

/// Build the HTTP-only cookie that carries `token`.
pub fn session_cookie(token: String, config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(Duration::seconds(SESSION_MAX_AGE_SECS))
        .build()
}
