//! Conversion from domain entities to ActivityPub objects
//!
//! Every function here is pure and total: the same entity state always
//! yields the same object, and no input can make conversion fail.

use super::context::PUBLIC_COLLECTION;
use super::objects::{
    ActorObjectType, ApubActor, Note, NoteType, Page, PageType, PublicKey,
};
use crate::data::{Actor, ActorType, Comment, EntityKind, Post};

const HTML_MEDIA_TYPE: &str = "text/html";

/// The identity carried by an ActivityPub IRI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub kind: EntityKind,
    pub id: String,
}

fn iri(base_url: &str, segment: &str, id: &str) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        segment,
        urlencoding::encode(id)
    )
}

fn actor_segment(actor_type: ActorType) -> &'static str {
    match actor_type {
        ActorType::Person => "u",
        ActorType::Group => "c",
    }
}

/// IRI of an actor: `{base}/u/{id}` for people, `{base}/c/{id}` for communities
pub fn actor_iri(base_url: &str, actor_type: ActorType, id: &str) -> String {
    iri(base_url, actor_segment(actor_type), id)
}

/// IRI of a person referenced only by ID (post/comment authors)
pub fn person_iri(base_url: &str, id: &str) -> String {
    actor_iri(base_url, ActorType::Person, id)
}

/// IRI of a community referenced only by ID
pub fn community_iri(base_url: &str, id: &str) -> String {
    actor_iri(base_url, ActorType::Group, id)
}

/// IRI of a post: `{base}/post/{id}`
pub fn post_iri(base_url: &str, id: &str) -> String {
    iri(base_url, "post", id)
}

/// IRI of a comment: `{base}/comment/{id}`
pub fn comment_iri(base_url: &str, id: &str) -> String {
    iri(base_url, "comment", id)
}

/// Recover the entity kind and ID from an IRI minted by this module
///
/// Returns `None` for IRIs on another origin or with an unknown path.
pub fn extract_identity(base_url: &str, iri: &str) -> Option<Identity> {
    let path = iri.strip_prefix(base_url.trim_end_matches('/'))?;
    let mut segments = path.strip_prefix('/')?.splitn(2, '/');
    let segment = segments.next()?;
    let encoded_id = segments.next()?;
    if encoded_id.is_empty() || encoded_id.contains('/') {
        return None;
    }

    let kind = match segment {
        "u" | "c" => EntityKind::Actor,
        "post" => EntityKind::Post,
        "comment" => EntityKind::Comment,
        _ => return None,
    };
    let id = urlencoding::decode(encoded_id).ok()?.into_owned();

    Some(Identity { kind, id })
}

/// Recover the identity of a serialized ActivityPub document
///
/// Checks that the document's `type` agrees with the kind encoded in its
/// `id`.
pub fn identity_of(base_url: &str, document: &serde_json::Value) -> Option<Identity> {
    let id = document.get("id")?.as_str()?;
    let identity = extract_identity(base_url, id)?;
    let expected = match document.get("type")?.as_str()? {
        "Person" | "Group" => EntityKind::Actor,
        "Page" => EntityKind::Post,
        "Note" => EntityKind::Comment,
        _ => return None,
    };

    (identity.kind == expected).then_some(identity)
}

fn sanitize_html(content: &str) -> String {
    ammonia::clean(content)
}

/// Convert an actor to a `Person` or `Group` document
pub fn actor_to_apub(actor: &Actor, base_url: &str) -> ApubActor {
    let actor_type = actor.kind();
    let id = actor_iri(base_url, actor_type, &actor.id);

    ApubActor {
        kind: match actor_type {
            ActorType::Person => ActorObjectType::Person,
            ActorType::Group => ActorObjectType::Group,
        },
        preferred_username: actor.username.clone(),
        name: actor.name.clone(),
        summary: actor.bio.as_deref().map(sanitize_html),
        inbox: format!("{}/inbox", id),
        outbox: format!("{}/outbox", id),
        followers: (actor_type == ActorType::Group).then(|| format!("{}/followers", id)),
        matrix_user_id: actor.matrix_user_id.clone(),
        public_key: actor.public_key.as_ref().map(|pem| PublicKey {
            id: format!("{}#main-key", id),
            owner: id.clone(),
            public_key_pem: pem.clone(),
        }),
        published: actor.created_at,
        updated: actor.updated_at,
        id,
    }
}

/// Convert a post to a `Page`
///
/// Posts are addressed to their community and the public collection.
pub fn post_to_apub(post: &Post, base_url: &str) -> Page {
    let community = community_iri(base_url, &post.community_id);

    Page {
        kind: PageType::Page,
        id: post_iri(base_url, &post.id),
        attributed_to: person_iri(base_url, &post.author_id),
        audience: community.clone(),
        to: vec![community, PUBLIC_COLLECTION.to_string()],
        cc: Vec::new(),
        name: post.title.clone(),
        content: post.body.as_deref().map(sanitize_html),
        media_type: HTML_MEDIA_TYPE.to_string(),
        url: post.url.clone(),
        sensitive: post.nsfw,
        published: post.published,
        updated: post.updated_at,
    }
}

/// Convert a comment to a `Note`
///
/// `inReplyTo` is the parent comment when there is one, otherwise the post.
pub fn comment_to_apub(comment: &Comment, base_url: &str) -> Note {
    let in_reply_to = match &comment.parent_id {
        Some(parent_id) => comment_iri(base_url, parent_id),
        None => post_iri(base_url, &comment.post_id),
    };

    Note {
        kind: NoteType::Note,
        id: comment_iri(base_url, &comment.id),
        attributed_to: person_iri(base_url, &comment.author_id),
        in_reply_to,
        to: vec![PUBLIC_COLLECTION.to_string()],
        cc: Vec::new(),
        content: sanitize_html(&comment.body),
        media_type: HTML_MEDIA_TYPE.to_string(),
        sensitive: comment.nsfw,
        published: comment.published,
        updated: comment.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activitypub::WithContext;
    use chrono::{TimeZone, Utc};

    const BASE: &str = "https://federation.example.com";

    fn fixed_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn actor(actor_type: &str) -> Actor {
        Actor {
            id: "7".to_string(),
            actor_type: actor_type.to_string(),
            username: "alice".to_string(),
            name: Some("Alice".to_string()),
            bio: Some("<p>hi</p><script>alert(1)</script>".to_string()),
            matrix_user_id: Some("@alice:matrix.org".to_string()),
            public_key: Some("PEM".to_string()),
            created_at: fixed_time(),
            updated_at: fixed_time(),
        }
    }

    fn post() -> Post {
        Post {
            id: "42".to_string(),
            author_id: "7".to_string(),
            community_id: "rust".to_string(),
            title: "Hello".to_string(),
            body: Some("<p>body</p>".to_string()),
            url: Some("https://example.org/article".to_string()),
            nsfw: false,
            published: fixed_time(),
            updated_at: fixed_time(),
        }
    }

    fn comment(parent_id: Option<&str>) -> Comment {
        Comment {
            id: "c1".to_string(),
            post_id: "42".to_string(),
            author_id: "7".to_string(),
            parent_id: parent_id.map(str::to_string),
            body: "reply".to_string(),
            nsfw: true,
            published: fixed_time(),
            updated_at: fixed_time(),
        }
    }

    #[test]
    fn iris_use_entity_specific_paths() {
        assert_eq!(post_iri(BASE, "42"), "https://federation.example.com/post/42");
        assert_eq!(person_iri(BASE, "7"), "https://federation.example.com/u/7");
        assert_eq!(community_iri(BASE, "rust"), "https://federation.example.com/c/rust");
        assert_eq!(
            comment_iri(&format!("{}/", BASE), "c1"),
            "https://federation.example.com/comment/c1"
        );
    }

    #[test]
    fn extract_identity_decodes_percent_encoded_ids() {
        let iri = post_iri(BASE, "a b/c");
        assert_eq!(iri, "https://federation.example.com/post/a%20b%2Fc");

        let identity = extract_identity(BASE, &iri).unwrap();
        assert_eq!(identity.kind, EntityKind::Post);
        assert_eq!(identity.id, "a b/c");
    }

    #[test]
    fn extract_identity_rejects_foreign_or_unknown_iris() {
        assert!(extract_identity(BASE, "https://other.example/post/1").is_none());
        assert!(extract_identity(BASE, "https://federation.example.com/inbox").is_none());
        assert!(extract_identity(BASE, "https://federation.example.com/post/").is_none());
        assert!(extract_identity(BASE, "https://federation.example.com/u/7/inbox").is_none());
    }

    #[test]
    fn person_conversion_round_trips_identity() {
        let document = serde_json::to_value(actor_to_apub(&actor("Person"), BASE)).unwrap();
        assert_eq!(document["type"], "Person");
        assert_eq!(document["inbox"], "https://federation.example.com/u/7/inbox");
        assert_eq!(
            document["publicKey"]["id"],
            "https://federation.example.com/u/7#main-key"
        );
        assert!(document.get("followers").is_none());

        let identity = identity_of(BASE, &document).unwrap();
        assert_eq!(identity, Identity { kind: EntityKind::Actor, id: "7".to_string() });
    }

    #[test]
    fn group_conversion_publishes_followers() {
        let group = actor_to_apub(&actor("Group"), BASE);
        assert_eq!(group.kind, ActorObjectType::Group);
        assert_eq!(group.id, "https://federation.example.com/c/7");
        assert_eq!(
            group.followers.as_deref(),
            Some("https://federation.example.com/c/7/followers")
        );
    }

    #[test]
    fn actor_summary_is_sanitized() {
        let person = actor_to_apub(&actor("Person"), BASE);
        let summary = person.summary.unwrap();
        assert!(summary.contains("<p>hi</p>"));
        assert!(!summary.contains("script"));
    }

    #[test]
    fn post_conversion_addresses_community_and_public() {
        let page = post_to_apub(&post(), BASE);
        assert_eq!(page.id, "https://federation.example.com/post/42");
        assert_eq!(page.attributed_to, "https://federation.example.com/u/7");
        assert_eq!(page.audience, "https://federation.example.com/c/rust");
        assert_eq!(
            page.to,
            vec![
                "https://federation.example.com/c/rust".to_string(),
                PUBLIC_COLLECTION.to_string()
            ]
        );
        assert_eq!(page.name, "Hello");

        let document = serde_json::to_value(&page).unwrap();
        assert_eq!(document["mediaType"], "text/html");
        let identity = identity_of(BASE, &document).unwrap();
        assert_eq!(identity, Identity { kind: EntityKind::Post, id: "42".to_string() });
    }

    #[test]
    fn post_conversion_is_deterministic() {
        let first = serde_json::to_vec(&WithContext::new(post_to_apub(&post(), BASE))).unwrap();
        let second = serde_json::to_vec(&WithContext::new(post_to_apub(&post(), BASE))).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn top_level_comment_replies_to_post() {
        let note = comment_to_apub(&comment(None), BASE);
        assert_eq!(note.in_reply_to, "https://federation.example.com/post/42");
        assert!(note.sensitive);
    }

    #[test]
    fn nested_comment_replies_to_parent() {
        let note = comment_to_apub(&comment(Some("c0")), BASE);
        assert_eq!(note.in_reply_to, "https://federation.example.com/comment/c0");

        let document = serde_json::to_value(&note).unwrap();
        let identity = identity_of(BASE, &document).unwrap();
        assert_eq!(identity, Identity { kind: EntityKind::Comment, id: "c1".to_string() });
    }

    #[test]
    fn identity_of_rejects_type_mismatch() {
        let mut document = serde_json::to_value(post_to_apub(&post(), BASE)).unwrap();
        document["type"] = serde_json::json!("Note");
        assert!(identity_of(BASE, &document).is_none());
    }
}
