//! JSON-LD `@context` handling
//!
//! Converted objects never carry a context of their own. Callers wrap the
//! finished object with [`WithContext`] as the last step before
//! serialization, so the context document is built once and shared.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// ActivityStreams vocabulary
pub const ACTIVITYSTREAMS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";

/// Security vocabulary (publicKey, publicKeyPem)
pub const SECURITY_CONTEXT: &str = "https://w3id.org/security/v1";

/// Public addressing collection
pub const PUBLIC_COLLECTION: &str = "https://www.w3.org/ns/activitystreams#Public";

lazy_static! {
    static ref CONTEXT: Value = serde_json::json!([
        ACTIVITYSTREAMS_CONTEXT,
        SECURITY_CONTEXT,
        {
            "lemmy": "https://join-lemmy.org/ns#",
            "litepub": "http://litepub.social/ns#",
            "pt": "https://joinpeertube.org/ns#",
            "sc": "http://schema.org/",
            "matrixUserId": "lemmy:matrixUserId",
            "sensitive": "as:sensitive",
            "stickied": "lemmy:stickied",
            "commentsEnabled": "pt:commentsEnabled",
            "postingRestrictedToMods": "lemmy:postingRestrictedToMods",
            "moderators": {
                "@type": "@id",
                "@id": "lemmy:moderators"
            }
        }
    ]);
}

/// The shared `@context` document
pub fn context() -> &'static Value {
    &CONTEXT
}

/// An ActivityPub object with its `@context` attached
///
/// `@context` is always serialized first, followed by the object's fields
/// in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithContext<T> {
    #[serde(rename = "@context")]
    pub context: Value,
    #[serde(flatten)]
    pub inner: T,
}

impl<T> WithContext<T> {
    /// Attach the shared context
    pub fn new(inner: T) -> Self {
        Self {
            context: context().clone(),
            inner,
        }
    }
}
