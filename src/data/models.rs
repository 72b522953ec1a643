//! Data models
//!
//! Rust structs representing the federated domain entities.
//! IDs are the platform's external identifiers; timestamps use chrono.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Actor
// =============================================================================

/// Kind of actor, mirrored onto the ActivityPub `type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorType {
    /// A user account
    Person,
    /// A community
    Group,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "Person",
            Self::Group => "Group",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Person" => Some(Self::Person),
            "Group" => Some(Self::Group),
            _ => None,
        }
    }
}

/// A user or community known to the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Actor {
    pub id: String,
    /// "Person" or "Group"
    pub actor_type: String,
    pub username: String,
    /// Display name
    pub name: Option<String>,
    pub bio: Option<String>,
    pub matrix_user_id: Option<String>,
    /// RSA public key (PEM format)
    pub public_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Actor {
    pub fn kind(&self) -> ActorType {
        ActorType::parse(&self.actor_type).unwrap_or(ActorType::Person)
    }
}

// =============================================================================
// Post
// =============================================================================

/// A post in a community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: String,
    /// Actor ID of the author
    pub author_id: String,
    /// Actor ID of the community the post was made in
    pub community_id: String,
    pub title: String,
    /// HTML body
    pub body: Option<String>,
    /// Link the post points to
    pub url: Option<String>,
    pub nsfw: bool,
    pub published: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Comment
// =============================================================================

/// A comment on a post, optionally replying to another comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    /// Parent comment ID; None for top-level comments
    pub parent_id: Option<String>,
    /// HTML body
    pub body: String,
    pub nsfw: bool,
    pub published: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Entity kinds
// =============================================================================

/// The three federated entity families
///
/// Used both as the routing-key prefix (`actor.created`) and to tag
/// ActivityPub identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Actor,
    Post,
    Comment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Actor => "actor",
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "actor" => Some(Self::Actor),
            "post" => Some(Self::Post),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
