//! Gateway routes
//!
//! Checks the raw `Authorization` header before proxying to the backend
//! services. Signup and signin pass straight through, customers are for
//! bosses, sales for anyone signed in.

use crate::auth::{require_auth, Authenticator, CredentialSource, Role, RoleSet, RouteGuard};
use crate::error::ApiResult;
use crate::gateway::Upstream;
use crate::state::SharedState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    middleware::from_fn_with_state,
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn router(state: &SharedState) -> Router<SharedState> {
    let authenticator = Arc::new(Authenticator::new(
        state.codec.clone(),
        CredentialSource::authorization_header(),
    ));
    let signed_in = RouteGuard::authenticated(authenticator.clone());
    let boss = RouteGuard::restricted(authenticator, RoleSet::only(Role::Boss));

    Router::new()
        .route("/signup", post(to_users))
        .route("/signin", post(to_users))
        .merge(
            Router::new()
                .route("/customers", get(to_customers).post(to_customers))
                .route(
                    "/customers/{id}",
                    get(to_customers).put(to_customers).delete(to_customers),
                )
                .route_layer(from_fn_with_state(boss, require_auth)),
        )
        .merge(
            Router::new()
                .route("/sales", get(to_sales).post(to_sales))
                .route("/sales/{id}", get(to_sales).put(to_sales).delete(to_sales))
                .route_layer(from_fn_with_state(signed_in, require_auth)),
        )
}

async fn to_users(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    proxy(&state, Upstream::Users, method, &uri, &headers, body).await
}

async fn to_customers(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    proxy(&state, Upstream::Customers, method, &uri, &headers, body).await
}

async fn to_sales(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    proxy(&state, Upstream::Sales, method, &uri, &headers, body).await
}

async fn proxy(
    state: &SharedState,
    upstream: Upstream,
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    state
        .upstream
        .forward(upstream, method, path_and_query, headers, body)
        .await
}

#[cfg(test)]
mod tests {
    use crate::auth::Role;
    use crate::config::{test_settings, ServiceMode};
    use crate::routes::create_router;
    use crate::state::{AppState, SharedState};
    use axum::{
        body::Body,
        extract::State,
        http::{
            header::{AUTHORIZATION, CONTENT_TYPE},
            HeaderMap, Method, Request, StatusCode, Uri,
        },
        Json, Router,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    /// Reports what it received so tests can check what the gateway forwarded
    async fn echo(
        State(hits): State<Arc<AtomicUsize>>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, Json<Value>) {
        hits.fetch_add(1, Ordering::SeqCst);
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let status = if method == Method::POST {
            StatusCode::CREATED
        } else {
            StatusCode::OK
        };
        (
            status,
            Json(json!({
                "method": method.as_str(),
                "path": uri.to_string(),
                "authorization": authorization,
                "body": body,
            })),
        )
    }

    async fn spawn_upstream() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().fallback(echo).with_state(hits.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (url, hits)
    }

    fn gateway(upstream: &str) -> (SharedState, Router) {
        let settings = test_settings(
            ServiceMode::Gateway,
            &[
                ("USER_SERVICE_URL", upstream),
                ("CUSTOMER_SERVICE_URL", upstream),
                ("SALES_SERVICE_URL", upstream),
                ("UPSTREAM_TIMEOUT_SECONDS", "2"),
            ],
        );
        let state = Arc::new(AppState::new(&settings).unwrap());
        (state.clone(), create_router(state, &settings))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, token);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_signin_passes_through_without_token() {
        let (url, hits) = spawn_upstream().await;
        let (_, app) = gateway(&url);

        let (status, body) = send(
            &app,
            Method::POST,
            "/signin",
            None,
            Some(json!({"username": "boss1", "password": "pw"})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["path"], "/signin");
        let forwarded: Value = serde_json::from_str(body["body"].as_str().unwrap()).unwrap();
        assert_eq!(forwarded, json!({"username": "boss1", "password": "pw"}));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_boss_token_forwarded_verbatim() {
        let (url, hits) = spawn_upstream().await;
        let (state, app) = gateway(&url);
        let token = state.codec.mint("boss1", Role::Boss).unwrap();

        let (status, body) = send(&app, Method::GET, "/customers?page=2", Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["method"], "GET");
        assert_eq!(body["path"], "/customers?page=2");
        assert_eq!(body["authorization"], token);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_employee_never_reaches_customer_service() {
        let (url, hits) = spawn_upstream().await;
        let (state, app) = gateway(&url);
        let token = state.codec.mint("emp1", Role::Employee).unwrap();

        let (status, body) = send(
            &app,
            Method::POST,
            "/customers",
            Some(&token),
            Some(json!({"name": "Test Customer", "email": "test@example.com"})),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_employee_reaches_sales_service() {
        let (url, hits) = spawn_upstream().await;
        let (state, app) = gateway(&url);
        let token = state.codec.mint("emp1", Role::Employee).unwrap();

        let (status, body) = send(&app, Method::DELETE, "/sales/42", Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["method"], "DELETE");
        assert_eq!(body["path"], "/sales/42");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_token_is_401() {
        let (url, hits) = spawn_upstream().await;
        let (_, app) = gateway(&url);

        let (status, body) = send(&app, Method::GET, "/sales", None, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Access denied. No token provided.");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bearer_prefix_is_not_stripped() {
        let (url, hits) = spawn_upstream().await;
        let (state, app) = gateway(&url);
        let token = state.codec.mint("boss1", Role::Boss).unwrap();

        let (status, _) = send(
            &app,
            Method::GET,
            "/customers",
            Some(&format!("Bearer {}", token)),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_502() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let (state, app) = gateway(&url);
        let token = state.codec.mint("emp1", Role::Employee).unwrap();

        let (status, body) = send(&app, Method::GET, "/sales", Some(&token), None).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "UPSTREAM_ERROR");
    }
}
