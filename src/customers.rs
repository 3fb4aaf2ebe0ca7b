//! Customer records
//!
//! In-memory customer store shared by the customer service and the
//! consolidated server.

use crate::error::{not_found_error, AppError};
use crate::models::{Note, NoteInput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub notes: Vec<Note>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Customer fields embedded in other records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Payload for creating a customer
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomer {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub notes: Vec<NoteInput>,
}

/// Partial update; absent fields are left unchanged and notes are appended
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCustomer {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "A valid email is required"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub notes: Vec<NoteInput>,
}

/// Thread-safe customer store
pub struct CustomerStore {
    customers: RwLock<HashMap<Uuid, Customer>>,
}

impl CustomerStore {
    pub fn new() -> Self {
        Self {
            customers: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new customer; emails are unique
    pub async fn create(&self, input: CreateCustomer) -> Result<Customer, AppError> {
        let mut customers = self.customers.write().await;
        if customers.values().any(|c| c.email == input.email) {
            return Err(AppError::Conflict(format!("Customer with email {} already exists", input.email)));
        }

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            company: input.company,
            notes: input.notes.into_iter().map(|n| n.stamp(now)).collect(),
            created_at: now,
            updated_at: now,
        };
        customers.insert(customer.id, customer.clone());

        Ok(customer)
    }

    /// List all customers, oldest first
    pub async fn list(&self) -> Vec<Customer> {
        let customers = self.customers.read().await;
        let mut all: Vec<Customer> = customers.values().cloned().collect();
        all.sort_by_key(|c| c.created_at);
        all
    }

    /// Get a customer by ID
    pub async fn get(&self, id: Uuid) -> Result<Customer, AppError> {
        self.customers
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error("Customer not found."))
    }

    pub async fn exists(&self, id: Uuid) -> bool {
        self.customers.read().await.contains_key(&id)
    }

    /// Name and email of each known customer among `ids`
    pub async fn summaries(&self, ids: impl IntoIterator<Item = Uuid>) -> HashMap<Uuid, CustomerSummary> {
        let customers = self.customers.read().await;
        ids.into_iter()
            .filter_map(|id| {
                customers.get(&id).map(|c| {
                    (
                        id,
                        CustomerSummary {
                            id,
                            name: c.name.clone(),
                            email: c.email.clone(),
                        },
                    )
                })
            })
            .collect()
    }

    /// Apply a partial update
    pub async fn update(&self, id: Uuid, update: UpdateCustomer) -> Result<Customer, AppError> {
        let mut customers = self.customers.write().await;

        if let Some(email) = &update.email {
            if customers.values().any(|c| c.id != id && &c.email == email) {
                return Err(AppError::Conflict(format!("Customer with email {} already exists", email)));
            }
        }

        let customer = customers
            .get_mut(&id)
            .ok_or_else(|| not_found_error("Customer not found."))?;

        let now = Utc::now();
        if let Some(name) = update.name {
            customer.name = name;
        }
        if let Some(email) = update.email {
            customer.email = email;
        }
        if update.phone.is_some() {
            customer.phone = update.phone;
        }
        if update.company.is_some() {
            customer.company = update.company;
        }
        customer
            .notes
            .extend(update.notes.into_iter().map(|n| n.stamp(now)));
        customer.updated_at = now;

        Ok(customer.clone())
    }

    /// Delete a customer
    pub async fn delete(&self, id: Uuid) -> Result<Customer, AppError> {
        self.customers
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| not_found_error("Customer not found."))
    }
}

impl Default for CustomerStore {
    fn default() -> Self {
        Self::new()
    }
}
