//! Storage-facing abstraction used by queue workers and HTTP handlers.

use async_trait::async_trait;

use super::models::{Actor, Comment, Post};
use crate::error::AppError;

/// Read/write access to federated entities
///
/// Upserts are keyed by the entity's external ID and must be idempotent:
/// queue delivery is at-least-once, so the same event can arrive twice.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// Create or replace an actor
    async fn upsert_actor(&self, actor: &Actor) -> Result<(), AppError>;

    /// Create or replace a post
    async fn upsert_post(&self, post: &Post) -> Result<(), AppError>;

    /// Create or replace a comment
    async fn upsert_comment(&self, comment: &Comment) -> Result<(), AppError>;

    async fn get_actor(&self, id: &str) -> Result<Option<Actor>, AppError>;

    async fn get_post(&self, id: &str) -> Result<Option<Post>, AppError>;

    async fn get_comment(&self, id: &str) -> Result<Option<Comment>, AppError>;
}
