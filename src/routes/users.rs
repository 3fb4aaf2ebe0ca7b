//! User service route handlers
//!
//! Signup and signin keyed by username. Tokens carry the user id and are
//! returned in the body; the gateway forwards them to the other services
//! untouched.

use crate::auth::{Role, RoleSet};
use crate::error::{validation_error, ApiResult, AppError};
use crate::state::SharedState;
use crate::users::NewUser;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("username pattern"));

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be between 3 and 64 characters"))]
    #[validate(regex(path = *USERNAME_RE, message = "Username may only contain letters, digits, '_', '.' and '-'"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SigninRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub fn service_router() -> Router<SharedState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
}

/// POST /signup
pub async fn signup(
    State(state): State<SharedState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    req.validate().map_err(|e| validation_error(e.to_string()))?;
    if !RoleSet::new(Role::Boss, &[Role::Employee]).contains(req.role) {
        return Err(AppError::BadRequest(format!("Role '{}' is not available", req.role)));
    }

    let user = state
        .users
        .register(NewUser {
            login: req.username,
            name: None,
            password: req.password,
            role: req.role,
        })
        .await?
        .ok_or_else(|| AppError::Conflict("Username already taken".to_string()))?;

    let token = state.codec.mint(&user.id.to_string(), user.role)?;
    info!("Registered user '{}' as {}", user.login, user.role);

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created successfully".to_string(),
            token,
        }),
    ))
}

/// POST /signin
pub async fn signin(
    State(state): State<SharedState>,
    Json(req): Json<SigninRequest>,
) -> ApiResult<Json<TokenResponse>> {
    req.validate().map_err(|e| validation_error(e.to_string()))?;

    let Some(user) = state.users.check_credentials(&req.username, &req.password).await else {
        warn!("Failed signin for '{}'", req.username);
        return Err(AppError::InvalidCredentials {
            status: StatusCode::UNAUTHORIZED,
            message: "Invalid credentials".to_string(),
        });
    };

    let token = state.codec.mint(&user.id.to_string(), user.role)?;
    Ok(Json(TokenResponse { token }))
}

#[cfg(test)]
mod tests {
    use crate::auth::Role;
    use crate::config::{test_settings, ServiceMode};
    use crate::routes::create_router;
    use crate::state::{AppState, SharedState};
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app() -> (SharedState, Router) {
        let settings = test_settings(ServiceMode::Users, &[]);
        let state = Arc::new(AppState::new(&settings).unwrap());
        (state.clone(), create_router(state, &settings))
    }

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_signup_returns_token() {
        let (state, app) = app();

        let (status, body) = post(
            &app,
            "/signup",
            json!({"username": "testuser", "password": "password123", "role": "employee"}),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User created successfully");
        let claims = state.codec.verify(body["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.role, Role::Employee);

        let user = state.users.check_credentials("testuser", "password123").await.unwrap();
        assert_eq!(Uuid::parse_str(&claims.sub).unwrap(), user.id);
    }

    #[tokio::test]
    async fn test_signup_defaults_to_employee() {
        let (state, app) = app();

        let (_, body) = post(&app, "/signup", json!({"username": "newbie", "password": "pw"})).await;
        let claims = state.codec.verify(body["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.role, Role::Employee);
    }

    #[tokio::test]
    async fn test_signup_rejects_admin_role() {
        let (_, app) = app();

        let (status, body) = post(
            &app,
            "/signup",
            json!({"username": "sneaky", "password": "pw", "role": "admin"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_signup_rejects_bad_username() {
        let (_, app) = app();

        let (status, _) = post(&app, "/signup", json!({"username": "no spaces!", "password": "pw"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let (_, app) = app();
        let user = json!({"username": "boss1", "password": "pw", "role": "boss"});

        let (status, _) = post(&app, "/signup", user.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = post(&app, "/signup", user).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_signin() {
        let (state, app) = app();
        post(&app, "/signup", json!({"username": "boss1", "password": "pw", "role": "boss"})).await;

        let (status, body) = post(&app, "/signin", json!({"username": "boss1", "password": "pw"})).await;
        assert_eq!(status, StatusCode::OK);
        let claims = state.codec.verify(body["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.role, Role::Boss);

        let user = state.users.check_credentials("boss1", "pw").await.unwrap();
        assert_eq!(claims.sub, user.id.to_string());
    }

    #[tokio::test]
    async fn test_signin_failures_are_indistinguishable() {
        let (_, app) = app();
        post(&app, "/signup", json!({"username": "boss1", "password": "pw"})).await;

        let (wrong_status, wrong_body) =
            post(&app, "/signin", json!({"username": "boss1", "password": "nope"})).await;
        let (unknown_status, unknown_body) =
            post(&app, "/signin", json!({"username": "ghost", "password": "pw"})).await;

        assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_status, unknown_status);
        assert_eq!(wrong_body, unknown_body);
        assert_eq!(wrong_body["message"], "Invalid credentials");
    }
}
