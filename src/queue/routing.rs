//! Routing table
//!
//! Maps each supported routing key to the worker that handles it. The
//! table is static so the set of keys the consumer binds to and the set
//! of keys the dispatcher can route are the same list.

use std::sync::Arc;

use crate::data::{EntityKind, Repository};
use crate::worker::{ActorWorker, CommentWorker, PostWorker, Worker};

/// Builds a worker bound to the shared repository
pub type WorkerConstructor = fn(Arc<dyn Repository>) -> Box<dyn Worker>;

/// One row of the routing table
pub struct Route {
    /// Exact routing key, e.g. `post.created`
    pub key: &'static str,
    /// Entity named by the key prefix
    pub kind: EntityKind,
    pub build: WorkerConstructor,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish()
    }
}

fn actor_worker(repository: Arc<dyn Repository>) -> Box<dyn Worker> {
    Box::new(ActorWorker::new(repository))
}

fn post_worker(repository: Arc<dyn Repository>) -> Box<dyn Worker> {
    Box::new(PostWorker::new(repository))
}

fn comment_worker(repository: Arc<dyn Repository>) -> Box<dyn Worker> {
    Box::new(CommentWorker::new(repository))
}

static ROUTES: &[Route] = &[
    Route { key: "actor.created", kind: EntityKind::Actor, build: actor_worker },
    Route { key: "actor.updated", kind: EntityKind::Actor, build: actor_worker },
    Route { key: "post.created", kind: EntityKind::Post, build: post_worker },
    Route { key: "post.updated", kind: EntityKind::Post, build: post_worker },
    Route { key: "comment.created", kind: EntityKind::Comment, build: comment_worker },
    Route { key: "comment.updated", kind: EntityKind::Comment, build: comment_worker },
];

/// All routes, in binding order
pub fn routes() -> &'static [Route] {
    ROUTES
}

/// Find the route for an exact routing key
pub fn lookup(routing_key: &str) -> Option<&'static Route> {
    ROUTES.iter().find(|route| route.key == routing_key)
}

/// Every routing key that has a worker
pub fn known_keys() -> Vec<String> {
    ROUTES.iter().map(|route| route.key.to_string()).collect()
}
