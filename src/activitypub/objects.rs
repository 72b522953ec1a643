//! Typed ActivityPub objects
//!
//! Field order in these structs is the serialization order, which keeps
//! output stable for identical input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ActivityStreams actor types we publish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorObjectType {
    Person,
    Group,
}

/// `Person` or `Group` actor document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApubActor {
    #[serde(rename = "type")]
    pub kind: ActorObjectType,
    pub id: String,
    pub preferred_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub inbox: String,
    pub outbox: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKey>,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Actor signing key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    pub id: String,
    pub owner: String,
    pub public_key_pem: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    Page,
}

/// A post, published as a `Page`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(rename = "type")]
    pub kind: PageType,
    pub id: String,
    pub attributed_to: String,
    pub audience: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    /// Post title
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub media_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub sensitive: bool,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteType {
    Note,
}

/// A comment, published as a `Note`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(rename = "type")]
    pub kind: NoteType,
    pub id: String,
    pub attributed_to: String,
    /// Parent comment, or the post for top-level comments
    pub in_reply_to: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub content: String,
    pub media_type: String,
    pub sensitive: bool,
    pub published: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}
