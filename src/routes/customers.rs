//! Customer route handlers
//!
//! Mounted without guards by the customer service and behind cookie guards
//! by the consolidated server.

use crate::customers::{CreateCustomer, Customer, UpdateCustomer};
use crate::error::{validation_error, ApiResult};
use crate::models::MessageResponse;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Customer service routes; access control happens at the gateway
pub fn service_router() -> Router<SharedState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route(
            "/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}

pub async fn create_customer(
    State(state): State<SharedState>,
    Json(payload): Json<CreateCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let customer = state.customers.create(payload).await?;
    info!("Created customer {}", customer.id);

    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn list_customers(State(state): State<SharedState>) -> Json<Vec<Customer>> {
    Json(state.customers.list().await)
}

pub async fn get_customer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(state.customers.get(id).await?))
}

pub async fn update_customer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomer>,
) -> ApiResult<Json<Customer>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    Ok(Json(state.customers.update(id, payload).await?))
}

pub async fn delete_customer(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    state.customers.delete(id).await?;
    info!("Deleted customer {}", id);

    Ok(Json(MessageResponse::new("Customer deleted.")))
}
