//! ActivityPub protocol layer
//!
//! Maps platform entities to their JSON-LD representations:
//! - Actor → `Person` / `Group`
//! - Post → `Page`
//! - Comment → `Note`
//!
//! Representations are regenerated from current entity state on every
//! request and never stored.

mod context;
mod convert;
mod objects;

pub use context::{
    ACTIVITYSTREAMS_CONTEXT, PUBLIC_COLLECTION, SECURITY_CONTEXT, WithContext, context,
};
pub use convert::{
    Identity, actor_iri, actor_to_apub, comment_iri, comment_to_apub, community_iri,
    extract_identity, identity_of, person_iri, post_iri, post_to_apub,
};
pub use objects::{ActorObjectType, ApubActor, Note, NoteType, Page, PageType, PublicKey};
