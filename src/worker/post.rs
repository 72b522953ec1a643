//! Post events (`post.created`, `post.updated`)

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Worker, decode, optional, required};
use crate::data::{Post, Repository};
use crate::error::ProcessingError;

/// Post event payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PostEvent {
    pub id: Option<String>,
    pub author_id: Option<String>,
    pub community_id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub nsfw: bool,
    pub published: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PostEvent {
    pub fn into_post(self) -> Result<Post, ProcessingError> {
        let id = required(self.id, "id")?;
        let author_id = required(self.author_id, "author_id")?;
        let community_id = required(self.community_id, "community_id")?;
        let title = required(self.title, "title")?;
        let published = self.published.unwrap_or_else(Utc::now);

        Ok(Post {
            id,
            author_id,
            community_id,
            title,
            body: optional(self.body),
            url: optional(self.url),
            nsfw: self.nsfw,
            published,
            updated_at: self.updated_at.unwrap_or(published),
        })
    }
}

/// Persists post events
pub struct PostWorker {
    repository: Arc<dyn Repository>,
}

impl PostWorker {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Worker for PostWorker {
    async fn process(&self, body: &[u8]) -> Result<(), ProcessingError> {
        let post = decode::<PostEvent>(body)?.into_post()?;

        self.repository
            .upsert_post(&post)
            .await
            .map_err(ProcessingError::Repository)?;

        tracing::debug!(post_id = %post.id, community_id = %post.community_id, "Post stored");
        Ok(())
    }
}
