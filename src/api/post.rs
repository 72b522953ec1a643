//! ActivityPub post endpoint
//!
//! `GET /post/:post_id` serves a stored post as a `Page` with its
//! JSON-LD context. The document is rebuilt from the current row on every
//! request.

use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};

use crate::AppState;
use crate::activitypub::{WithContext, post_to_apub};
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};

/// Media type for ActivityPub documents
pub const ACTIVITY_JSON: &str = "application/activity+json";

const ENDPOINT: &str = "/post/:post_id";

pub fn post_router() -> Router<AppState> {
    Router::new().route(ENDPOINT, get(get_post))
}

/// GET /post/:post_id
///
/// - 200 with a pretty-printed `Page` document
/// - 404 when no post has this ID
/// - 500 when storage fails
async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Response, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", ENDPOINT])
        .start_timer();

    let result = render_post(&state, &post_id).await;

    let status = match &result {
        Ok(_) => "200",
        Err(AppError::NotFound) => "404",
        Err(_) => "500",
    };
    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", ENDPOINT, status])
        .inc();

    if let Err(e) = &result {
        if !matches!(e, AppError::NotFound) {
            tracing::error!(post_id = %post_id, error = %e, "Failed to serve post");
        }
    }

    result
}

async fn render_post(state: &AppState, post_id: &str) -> Result<Response, AppError> {
    let post = state
        .repository
        .get_post(post_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let page = post_to_apub(&post, &state.config.server.base_url());
    let body = serde_json::to_string_pretty(&WithContext::new(page))
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(([(header::CONTENT_TYPE, ACTIVITY_JSON)], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::valid_config;
    use crate::data::{MockRepository, Post};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(repository: MockRepository) -> Router {
        post_router().with_state(AppState::new(valid_config(), Arc::new(repository)))
    }

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn existing_post_is_served_as_page() {
        let mut repository = MockRepository::new();
        repository
            .expect_get_post()
            .withf(|id| id == "42")
            .returning(|_| {
                let published = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
                Ok(Some(Post {
                    id: "42".to_string(),
                    author_id: "7".to_string(),
                    community_id: "rust".to_string(),
                    title: "Hello".to_string(),
                    body: None,
                    url: None,
                    nsfw: false,
                    published,
                    updated_at: published,
                }))
            });

        let response = app(repository).oneshot(request("/post/42")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], ACTIVITY_JSON);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains('\n'), "body should be pretty-printed");

        let document: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(document["type"], "Page");
        assert_eq!(document["id"], "http://localhost/post/42");
        assert!(document["@context"].is_array());
    }

    #[tokio::test]
    async fn missing_post_returns_404_json() {
        let mut repository = MockRepository::new();
        repository.expect_get_post().returning(|_| Ok(None));

        let response = app(repository).oneshot(request("/post/999")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn storage_failure_returns_500() {
        let mut repository = MockRepository::new();
        repository
            .expect_get_post()
            .returning(|_| Err(AppError::Database(sqlx::Error::PoolTimedOut)));

        let response = app(repository).oneshot(request("/post/42")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
