//! Data models and DTOs (Data Transfer Objects)
//!
//! Request/response structures shared by more than one service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Message-only response (no data)
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Free-text note attached to a customer or a sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub content: String,
    pub date: DateTime<Utc>,
}

/// Note as submitted by a client; the server stamps the date
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NoteInput {
    #[validate(length(min = 1, message = "Note content is required"))]
    pub content: String,
}

impl NoteInput {
    pub fn stamp(self, date: DateTime<Utc>) -> Note {
        Note {
            content: self.content,
            date,
        }
    }
}
