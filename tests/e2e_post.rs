//! E2E tests for ActivityPub post retrieval

mod common;

use common::{DOMAIN, TestServer};
use serde_json::Value;
use sublinks_federation::activitypub::{ACTIVITYSTREAMS_CONTEXT, extract_identity};
use sublinks_federation::data::EntityKind;

#[tokio::test]
async fn test_get_post_returns_page() {
    let server = TestServer::new().await;
    server.create_test_post("42").await;

    let response = server
        .client
        .get(server.url("/post/42"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "application/activity+json"
    );

    let json: Value = response.json().await.unwrap();
    assert_eq!(json["@context"][0], ACTIVITYSTREAMS_CONTEXT);
    assert_eq!(json["type"], "Page");
    assert_eq!(json["id"], format!("https://{}/post/42", DOMAIN));
    assert_eq!(json["name"], "Hello federation");
    assert_eq!(json["attributedTo"], format!("https://{}/u/7", DOMAIN));
}

#[tokio::test]
async fn test_get_post_id_round_trips() {
    let server = TestServer::new().await;
    server.create_test_post("a b").await;

    let response = server
        .client
        .get(server.url("/post/a%20b"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let json: Value = response.json().await.unwrap();
    let id = json["id"].as_str().unwrap();
    let identity = extract_identity(&format!("https://{}", DOMAIN), id).unwrap();
    assert_eq!(identity.kind, EntityKind::Post);
    assert_eq!(identity.id, "a b");
}

#[tokio::test]
async fn test_get_post_reflects_latest_state() {
    let server = TestServer::new().await;
    let mut post = server.create_test_post("42").await;

    post.title = "Edited title".to_string();
    post.updated_at = post.published + chrono::Duration::hours(1);
    sublinks_federation::data::Repository::upsert_post(&server.db, &post)
        .await
        .unwrap();

    let json: Value = server
        .client
        .get(server.url("/post/42"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["name"], "Edited title");
}

#[tokio::test]
async fn test_get_missing_post_returns_404_json() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/post/999"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let json: Value = response.json().await.unwrap();
    assert!(json["error"].is_string());
}
