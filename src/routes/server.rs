//! Consolidated server routes
//!
//! Users, customers and sales in one process. Credentials travel in an
//! HTTP-only session cookie; reads need a signed-in user and writes need an
//! admin.

use super::{customers, sales};
use crate::auth::{
    require_auth, session_cookie, Authenticator, CredentialSource, CurrentUser, Identity, Role,
    RoleSet, RouteGuard,
};
use crate::error::{validation_error, ApiResult, AppError};
use crate::models::MessageResponse;
use crate::state::SharedState;
use crate::users::NewUser;
use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Build the consolidated router with the cookie guards wired in
pub fn router(state: &SharedState) -> Router<SharedState> {
    let authenticator = Arc::new(Authenticator::new(
        state.codec.clone(),
        CredentialSource::cookie(state.auth.cookie_name.clone()),
    ));
    let signed_in = RouteGuard::authenticated(authenticator.clone());
    let admin = RouteGuard::restricted(authenticator, RoleSet::only(Role::Admin));

    Router::new()
        .route("/api/user/register", post(register))
        .route("/api/user/login", post(login))
        .merge(
            // Any signed-in user
            Router::new()
                .route("/api/user/me", get(me))
                .route("/api/customers", get(customers::list_customers))
                .route("/api/customers/{id}", get(customers::get_customer))
                .route("/api/sales", get(sales::list_linked_sales))
                .route("/api/sales/{id}", get(sales::get_sale))
                .route_layer(from_fn_with_state(signed_in, require_auth)),
        )
        .merge(
            // Admin only
            Router::new()
                .route("/api/user", get(welcome_admin))
                .route("/api/customers", post(customers::create_customer))
                .route("/api/customers/{id}", put(customers::update_customer))
                .route("/api/customers/{id}", delete(customers::delete_customer))
                .route("/api/sales", post(sales::create_linked_sale))
                .route("/api/sales/{id}", put(sales::update_sale))
                .route("/api/sales/{id}", delete(sales::delete_sale))
                .route_layer(from_fn_with_state(admin, require_auth)),
        )
}

/// POST /api/user/register
pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    req.validate().map_err(|e| validation_error(e.to_string()))?;
    if !RoleSet::new(Role::Admin, &[Role::Employee]).contains(req.role) {
        return Err(AppError::BadRequest(format!("Role '{}' is not available", req.role)));
    }

    let user = state
        .users
        .register(NewUser {
            login: req.email,
            name: Some(req.name),
            password: req.password,
            role: req.role,
        })
        .await?
        .ok_or(AppError::UserExists)?;

    info!("Registered {} ({})", user.login, user.role);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

/// POST /api/user/login
///
/// Sets the session cookie; the token never appears in the body.
pub async fn login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<MessageResponse>)> {
    req.validate().map_err(|e| validation_error(e.to_string()))?;

    let Some(user) = state.users.check_credentials(&req.email, &req.password).await else {
        warn!("Failed login for {}", req.email);
        return Err(AppError::InvalidCredentials {
            status: StatusCode::BAD_REQUEST,
            message: "Invalid credentials.".to_string(),
        });
    };

    let token = state.codec.mint(&user.id.to_string(), user.role)?;
    let jar = jar.add(session_cookie(token, &state.auth));

    Ok((jar, Json(MessageResponse::new("Logged in successfully"))))
}

/// GET /api/user
pub async fn welcome_admin() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome, Admin!"))
}

/// GET /api/user/me
pub async fn me(CurrentUser(identity): CurrentUser) -> Json<Identity> {
    Json(identity)
}
