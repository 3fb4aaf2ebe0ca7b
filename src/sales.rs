//! Sale records
//!
//! In-memory sale store shared by the sales service and the consolidated
//! server. Every status change is appended to the sale's history.

use crate::customers::CustomerSummary;
use crate::error::{not_found_error, AppError};
use crate::models::{Note, NoteInput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

/// Pipeline stage of a sale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleStatus {
    #[default]
    New,
    Contact,
    Deal,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub status: SaleStatus,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub customer_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub status: SaleStatus,
    pub notes: Vec<Note>,
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sale with its customer filled in; `customer` is null once the
/// customer is gone
#[derive(Debug, Clone, Serialize)]
pub struct SaleWithCustomer {
    #[serde(flatten)]
    pub sale: Sale,
    pub customer: Option<CustomerSummary>,
}

/// Payload for creating a sale
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSale {
    pub customer_id: Uuid,
    #[validate(length(min = 1, message = "Product name cannot be empty"))]
    pub product_name: Option<String>,
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub amount: Option<f64>,
    #[serde(default)]
    pub status: SaleStatus,
    #[serde(default)]
    #[validate(nested)]
    pub notes: Vec<NoteInput>,
}

/// Partial update; notes are appended
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSale {
    #[validate(length(min = 1, message = "Product name cannot be empty"))]
    pub product_name: Option<String>,
    #[validate(range(min = 0.0, message = "Amount cannot be negative"))]
    pub amount: Option<f64>,
    pub status: Option<SaleStatus>,
    #[serde(default)]
    #[validate(nested)]
    pub notes: Vec<NoteInput>,
}

/// Thread-safe sale store
pub struct SaleStore {
    sales: RwLock<HashMap<Uuid, Sale>>,
}

impl SaleStore {
    pub fn new() -> Self {
        Self {
            sales: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new sale; its initial status opens the history
    pub async fn create(&self, input: CreateSale) -> Sale {
        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4(),
            customer_id: input.customer_id,
            product_name: input.product_name,
            amount: input.amount,
            status: input.status,
            notes: input.notes.into_iter().map(|n| n.stamp(now)).collect(),
            status_history: vec![StatusChange {
                status: input.status,
                date: now,
            }],
            created_at: now,
            updated_at: now,
        };

        self.sales.write().await.insert(sale.id, sale.clone());
        sale
    }

    /// List all sales, oldest first
    pub async fn list(&self) -> Vec<Sale> {
        let sales = self.sales.read().await;
        let mut all: Vec<Sale> = sales.values().cloned().collect();
        all.sort_by_key(|s| s.created_at);
        all
    }

    /// Get a sale by ID
    pub async fn get(&self, id: Uuid) -> Result<Sale, AppError> {
        self.sales
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error("Sale not found."))
    }

    /// Apply a partial update, recording any status change
    pub async fn update(&self, id: Uuid, update: UpdateSale) -> Result<Sale, AppError> {
        let mut sales = self.sales.write().await;
        let sale = sales
            .get_mut(&id)
            .ok_or_else(|| not_found_error("Sale not found."))?;

        let now = Utc::now();
        if let Some(product_name) = update.product_name {
            sale.product_name = Some(product_name);
        }
        if let Some(amount) = update.amount {
            sale.amount = Some(amount);
        }
        if let Some(status) = update.status {
            sale.status = status;
            sale.status_history.push(StatusChange { status, date: now });
        }
        sale.notes.extend(update.notes.into_iter().map(|n| n.stamp(now)));
        sale.updated_at = now;

        Ok(sale.clone())
    }

    /// Delete a sale
    pub async fn delete(&self, id: Uuid) -> Result<Sale, AppError> {
        self.sales
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| not_found_error("Sale not found."))
    }
}

impl Default for SaleStore {
    fn default() -> Self {
        Self::new()
    }
}
