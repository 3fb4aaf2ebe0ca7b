//! Sale route handlers
//!
//! Mounted without guards by the sales service and behind cookie guards by
//! the consolidated server.

use crate::error::{not_found_error, validation_error, ApiResult};
use crate::models::MessageResponse;
use crate::sales::{CreateSale, Sale, SaleWithCustomer, UpdateSale};
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

/// Sales service routes; access control happens at the gateway
pub fn service_router() -> Router<SharedState> {
    Router::new()
        .route("/sales", get(list_sales).post(create_sale))
        .route(
            "/sales/{id}",
            get(get_sale).put(update_sale).delete(delete_sale),
        )
}

/// Create a sale without looking up the customer; the customer lives in
/// another service.
pub async fn create_sale(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSale>,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let sale = state.sales.create(payload).await;
    info!("Created sale {} for customer {}", sale.id, sale.customer_id);

    Ok((StatusCode::CREATED, Json(sale)))
}

/// Create a sale only for a customer held by this process
pub async fn create_linked_sale(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSale>,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    if !state.customers.exists(payload.customer_id).await {
        return Err(not_found_error("Customer not found."));
    }
    create_sale(State(state), Json(payload)).await
}

pub async fn list_sales(State(state): State<SharedState>) -> Json<Vec<Sale>> {
    Json(state.sales.list().await)
}

/// List sales with each customer's name and email from this process
pub async fn list_linked_sales(State(state): State<SharedState>) -> Json<Vec<SaleWithCustomer>> {
    let sales = state.sales.list().await;
    let customers = state
        .customers
        .summaries(sales.iter().map(|s| s.customer_id))
        .await;

    Json(
        sales
            .into_iter()
            .map(|sale| SaleWithCustomer {
                customer: customers.get(&sale.customer_id).cloned(),
                sale,
            })
            .collect(),
    )
}

pub async fn get_sale(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Sale>> {
    Ok(Json(state.sales.get(id).await?))
}

pub async fn update_sale(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSale>,
) -> ApiResult<Json<Sale>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    Ok(Json(state.sales.update(id, payload).await?))
}

pub async fn delete_sale(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    state.sales.delete(id).await?;
    info!("Deleted sale {}", id);

    Ok(Json(MessageResponse::new("Sale deleted.")))
}
