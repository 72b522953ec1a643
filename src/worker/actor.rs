//! Actor events (`actor.created`, `actor.updated`)

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Worker, decode, optional, required};
use crate::data::{Actor, ActorType, Repository};
use crate::error::ProcessingError;

/// Actor event payload as published by the platform
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActorEvent {
    pub id: Option<String>,
    /// "Person" or "Group"; defaults to "Person"
    pub actor_type: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub matrix_user_id: Option<String>,
    pub public_key: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ActorEvent {
    /// Validate required fields and build the domain entity
    pub fn into_actor(self) -> Result<Actor, ProcessingError> {
        let id = required(self.id, "id")?;
        let username = required(self.username, "username")?;
        let actor_type = match self.actor_type.as_deref() {
            None => ActorType::Person,
            Some(value) => ActorType::parse(value).ok_or_else(|| {
                ProcessingError::Validation(format!("unsupported actor_type: {}", value))
            })?,
        };

        let created_at = self.created_at.unwrap_or_else(Utc::now);

        Ok(Actor {
            id,
            actor_type: actor_type.as_str().to_string(),
            username,
            name: optional(self.name),
            bio: optional(self.bio),
            matrix_user_id: optional(self.matrix_user_id),
            public_key: optional(self.public_key),
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        })
    }
}

/// Persists actor events
pub struct ActorWorker {
    repository: Arc<dyn Repository>,
}

impl ActorWorker {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Worker for ActorWorker {
    async fn process(&self, body: &[u8]) -> Result<(), ProcessingError> {
        let actor = decode::<ActorEvent>(body)?.into_actor()?;

        self.repository
            .upsert_actor(&actor)
            .await
            .map_err(ProcessingError::Repository)?;

        tracing::debug!(actor_id = %actor.id, username = %actor.username, "Actor stored");
        Ok(())
    }
}
