//! Request guards
//!
//! A [`RouteGuard`] runs the authenticator and, when the route is restricted,
//! the role check, before the handler sees the request. The checks are plain
//! functions over the request headers; [`require_auth`] only adapts them to
//! axum middleware.

use crate::auth::{AuthError, Identity, Role, TokenCodec, VerifyError};
use crate::error::AppError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a deployment expects the caller's token
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// The whole header value is the token, no scheme prefix
    Header(HeaderName),
    /// The value of the named cookie is the token
    Cookie(String),
}

impl CredentialSource {
    pub fn authorization_header() -> Self {
        CredentialSource::Header(AUTHORIZATION)
    }

    pub fn cookie(name: impl Into<String>) -> Self {
        CredentialSource::Cookie(name.into())
    }

    fn extract(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        let token = match self {
            CredentialSource::Header(name) => match headers.get(name) {
                Some(value) => value
                    .to_str()
                    .map_err(|_| AuthError::MalformedCredential)?
                    .to_string(),
                None => return Err(AuthError::MissingCredential),
            },
            CredentialSource::Cookie(name) => CookieJar::from_headers(headers)
                .get(name)
                .map(|cookie| cookie.value().to_string())
                .ok_or(AuthError::MissingCredential)?,
        };

        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }
        Ok(token)
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Header(name) => write!(f, "header {}", name),
            CredentialSource::Cookie(name) => write!(f, "cookie {}", name),
        }
    }
}

/// Turns a request's credential into an [`Identity`]
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    source: CredentialSource,
}

impl Authenticator {
    pub fn new(codec: Arc<TokenCodec>, source: CredentialSource) -> Self {
        Self { codec, source }
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let token = self.source.extract(headers)?;

        let claims = self.codec.verify(&token).map_err(|e| match e {
            VerifyError::Malformed => AuthError::MalformedCredential,
            VerifyError::BadSignature => AuthError::BadSignature,
            VerifyError::Expired => AuthError::Expired,
        })?;

        Ok(Identity::from_claims(claims))
    }
}

/// Non-empty set of roles allowed on a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSet(Vec<Role>);

impl RoleSet {
    pub fn new(first: Role, rest: &[Role]) -> Self {
        let mut roles = vec![first];
        roles.extend(rest.iter().copied().filter(|role| *role != first));
        Self(roles)
    }

    pub fn only(role: Role) -> Self {
        Self(vec![role])
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn roles(&self) -> &[Role] {
        &self.0
    }
}

/// Allow `identity` through only if its role is in `allowed`
pub fn authorize(identity: &Identity, allowed: &RoleSet) -> Result<(), AuthError> {
    if allowed.contains(identity.role()) {
        Ok(())
    } else {
        Err(AuthError::InsufficientRole {
            role: identity.role(),
        })
    }
}

/// Per-route pipeline: authenticate, then optionally authorize
#[derive(Clone)]
pub struct RouteGuard {
    authenticator: Arc<Authenticator>,
    roles: Option<RoleSet>,
}

impl RouteGuard {
    /// Any caller with a valid token
    pub fn authenticated(authenticator: Arc<Authenticator>) -> Self {
        Self {
            authenticator,
            roles: None,
        }
    }

    /// Callers with a valid token and one of `roles`
    pub fn restricted(authenticator: Arc<Authenticator>, roles: RoleSet) -> Self {
        Self {
            authenticator,
            roles: Some(roles),
        }
    }

    pub fn roles(&self) -> Option<&RoleSet> {
        self.roles.as_ref()
    }

    pub fn check(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let identity = self.authenticator.authenticate(headers)?;
        if let Some(roles) = &self.roles {
            authorize(&identity, roles)?;
        }
        Ok(identity)
    }
}

/// Middleware applying a [`RouteGuard`]; the handler only runs on success
pub async fn require_auth(
    State(guard): State<RouteGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = match guard.check(request.headers()) {
        Ok(identity) => identity,
        Err(err) => {
            let path = request.uri().path();
            match &err {
                AuthError::MissingCredential => {
                    debug!(%path, source = %guard.authenticator.source(), "no credential presented")
                }
                AuthError::Expired => info!(%path, "credential expired"),
                AuthError::MalformedCredential | AuthError::BadSignature => {
                    warn!(%path, reason = err.code(), "credential failed verification")
                }
                AuthError::InsufficientRole { role } => {
                    let allowed = guard.roles().map(RoleSet::roles).unwrap_or_default();
                    warn!(%path, %role, ?allowed, "role not permitted on route")
                }
            }
            return Err(err);
        }
    };

    debug!(subject = identity.subject(), role = %identity.role(), "request authenticated");
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Extractor for the identity attached by [`require_auth`]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Internal("Route is not behind an authentication guard".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::COOKIE, HeaderValue, Method, StatusCode},
        middleware::from_fn_with_state,
        routing::{get, post},
        Router,
    };
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &str = "guard-test-secret";

    fn codec() -> Arc<TokenCodec> {
        Arc::new(TokenCodec::new(SECRET, Some(Duration::from_secs(3600))))
    }

    fn header_auth() -> Arc<Authenticator> {
        Arc::new(Authenticator::new(codec(), CredentialSource::authorization_header()))
    }

    fn cookie_auth() -> Arc<Authenticator> {
        Arc::new(Authenticator::new(codec(), CredentialSource::cookie("token")))
    }

    fn with_authorization(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(token).unwrap());
        headers
    }

    fn boss_only() -> RouteGuard {
        RouteGuard::restricted(header_auth(), RoleSet::only(Role::Boss))
    }

    #[test]
    fn test_missing_header_is_missing_credential() {
        let guard = RouteGuard::authenticated(header_auth());
        assert_eq!(guard.check(&HeaderMap::new()), Err(AuthError::MissingCredential));
        assert_eq!(guard.check(&with_authorization("")), Err(AuthError::MissingCredential));
    }

    #[test]
    fn test_garbage_header_is_malformed() {
        let guard = RouteGuard::authenticated(header_auth());
        assert_eq!(
            guard.check(&with_authorization("definitely-not-a-jwt")),
            Err(AuthError::MalformedCredential)
        );
    }

    #[test]
    fn test_non_utf8_header_is_malformed() {
        let guard = RouteGuard::authenticated(header_auth());
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_bytes(&[0xfa, 0xfb]).unwrap());
        assert_eq!(guard.check(&headers), Err(AuthError::MalformedCredential));
    }

    #[test]
    fn test_foreign_secret_is_bad_signature() {
        let foreign = TokenCodec::new("someone-else", None);
        let token = foreign.mint("u1", Role::Boss).unwrap();
        assert_eq!(boss_only().check(&with_authorization(&token)), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_expired_token_is_expired() {
        let issued = Utc::now() - chrono::Duration::hours(2);
        let token = codec().mint_at("u1", Role::Boss, issued).unwrap();
        assert_eq!(boss_only().check(&with_authorization(&token)), Err(AuthError::Expired));
    }

    #[test]
    fn test_employee_is_forbidden_on_boss_route() {
        let token = codec().mint("u1", Role::Employee).unwrap();
        assert_eq!(
            boss_only().check(&with_authorization(&token)),
            Err(AuthError::InsufficientRole { role: Role::Employee })
        );
    }

    #[test]
    fn test_boss_passes_boss_route() {
        let token = codec().mint("u2", Role::Boss).unwrap();
        let identity = boss_only().check(&with_authorization(&token)).unwrap();
        assert_eq!(identity.subject(), "u2");
        assert_eq!(identity.role(), Role::Boss);
    }

    #[test]
    fn test_authenticated_only_accepts_any_role() {
        let guard = RouteGuard::authenticated(header_auth());
        let token = codec().mint("u1", Role::Employee).unwrap();
        assert!(guard.check(&with_authorization(&token)).is_ok());
        assert!(guard.roles().is_none());
    }

    #[test]
    fn test_authorize_passes_members_through() {
        let token = codec().mint("u3", Role::Admin).unwrap();
        let identity = header_auth().authenticate(&with_authorization(&token)).unwrap();

        let allowed = RoleSet::new(Role::Admin, &[Role::Employee, Role::Admin]);
        assert_eq!(allowed.roles(), &[Role::Admin, Role::Employee]);
        assert_eq!(authorize(&identity, &allowed), Ok(()));
        assert_eq!(
            authorize(&identity, &RoleSet::only(Role::Boss)),
            Err(AuthError::InsufficientRole { role: Role::Admin })
        );
    }

    #[test]
    fn test_cookie_source_reads_cookie_only() {
        let guard = RouteGuard::authenticated(cookie_auth());
        let token = codec().mint("u4", Role::Employee).unwrap();

        // A header token is not a cookie.
        assert_eq!(guard.check(&with_authorization(&token)), Err(AuthError::MissingCredential));

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; token={}", token)).unwrap(),
        );
        assert_eq!(guard.check(&headers).unwrap().subject(), "u4");
    }

    #[test]
    fn test_header_source_ignores_cookie() {
        let guard = RouteGuard::authenticated(header_auth());
        let token = codec().mint("u5", Role::Boss).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("token={}", token)).unwrap());
        assert_eq!(guard.check(&headers), Err(AuthError::MissingCredential));
    }

    fn counted_app(guard: RouteGuard, hits: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/customers",
                post(move |CurrentUser(user): CurrentUser| {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        user.subject().to_string()
                    }
                }),
            )
            .route_layer(from_fn_with_state(guard, require_auth))
    }

    fn post_customers(token: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/customers");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, token);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_no_credential_never_reaches_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = counted_app(boss_only(), hits.clone());

        let response = app.oneshot(post_customers(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_employee_gets_403_without_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = counted_app(boss_only(), hits.clone());
        let token = codec().mint("u1", Role::Employee).unwrap();

        let response = app.oneshot(post_customers(Some(&token))).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_boss_reaches_handler_with_identity() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = counted_app(boss_only(), hits.clone());
        let token = codec().mint("u2", Role::Boss).unwrap();

        let response = app.oneshot(post_customers(Some(&token))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"u2");
    }

    #[tokio::test]
    async fn test_tampered_signature_gets_400() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = counted_app(boss_only(), hits.clone());
        let token = codec().mint("u2", Role::Boss).unwrap();
        let mut tampered = token[..token.len() - 1].to_string();
        tampered.push(if token.ends_with('A') { 'E' } else { 'A' });

        let response = app.oneshot(post_customers(Some(&tampered))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejection_body_carries_code() {
        let app = counted_app(boss_only(), Arc::new(AtomicUsize::new(0)));
        let response = app.oneshot(post_customers(Some("junk"))).await.unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "MALFORMED_CREDENTIAL");
        assert_eq!(json["message"], "Invalid token.");
    }

    #[tokio::test]
    async fn test_unguarded_route_cannot_read_identity() {
        let app = Router::new().route(
            "/me",
            get(|CurrentUser(user): CurrentUser| async move { user.subject().to_string() }),
        );
        let request = axum::http::Request::builder().uri("/me").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
