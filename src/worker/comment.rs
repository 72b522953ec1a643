//! Comment events (`comment.created`, `comment.updated`)

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Worker, decode, optional, required};
use crate::data::{Comment, Repository};
use crate::error::ProcessingError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentEvent {
    pub id: Option<String>,
    pub post_id: Option<String>,
    pub author_id: Option<String>,
    /// Absent for top-level comments
    pub parent_id: Option<String>,
    pub body: Option<String>,
    pub nsfw: bool,
    pub published: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CommentEvent {
    pub fn into_comment(self) -> Result<Comment, ProcessingError> {
        let id = required(self.id, "id")?;
        let post_id = required(self.post_id, "post_id")?;
        let author_id = required(self.author_id, "author_id")?;
        let body = required(self.body, "body")?;
        let published = self.published.unwrap_or_else(Utc::now);

        Ok(Comment {
            id,
            post_id,
            author_id,
            parent_id: optional(self.parent_id),
            body,
            nsfw: self.nsfw,
            published,
            updated_at: self.updated_at.unwrap_or(published),
        })
    }
}

/// Persists comment events
pub struct CommentWorker {
    repository: Arc<dyn Repository>,
}

impl CommentWorker {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Worker for CommentWorker {
    async fn process(&self, body: &[u8]) -> Result<(), ProcessingError> {
        let comment = decode::<CommentEvent>(body)?.into_comment()?;

        self.repository
            .upsert_comment(&comment)
            .await
            .map_err(ProcessingError::Repository)?;

        tracing::debug!(comment_id = %comment.id, post_id = %comment.post_id, "Comment stored");
        Ok(())
    }
}
