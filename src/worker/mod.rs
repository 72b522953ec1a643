//! Entity workers
//!
//! One worker per federated entity type. A worker turns a raw queue
//! payload into exactly one repository write:
//!
//! 1. Decode the JSON payload into a typed event record
//! 2. Validate required fields, producing the domain entity
//! 3. Upsert the entity through the `Repository`
//!
//! Workers are constructed fresh for every message and hold no state
//! besides the shared repository handle.

mod actor;
mod comment;
mod post;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::ProcessingError;

pub use actor::{ActorEvent, ActorWorker};
pub use comment::{CommentEvent, CommentWorker};
pub use post::{PostEvent, PostWorker};

/// Processes one queue payload
#[async_trait]
pub trait Worker: Send + Sync {
    /// Decode, validate and persist `body`
    ///
    /// # Errors
    /// - `Decode` if the payload is not valid JSON for the event
    /// - `Validation` if required fields are missing (nothing is written)
    /// - `Repository` if the write fails
    async fn process(&self, body: &[u8]) -> Result<(), ProcessingError>;
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProcessingError> {
    Ok(serde_json::from_slice(body)?)
}

/// Require a present, non-blank string field
fn required(value: Option<String>, field: &str) -> Result<String, ProcessingError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ProcessingError::Validation(format!(
            "missing required field: {}",
            field
        ))),
    }
}

/// Drop blank optional strings so they are stored as NULL
fn optional(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
