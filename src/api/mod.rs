//! API layer
//!
//! HTTP handlers for:
//! - ActivityPub object retrieval (`/post/:post_id`)
//! - Metrics (Prometheus)

pub mod metrics;
mod post;

pub use metrics::metrics_router;
pub use post::{ACTIVITY_JSON, post_router};
