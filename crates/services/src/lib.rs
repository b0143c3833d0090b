//! photogram/crates/services/src/lib.rs
//!
//! The core of Photogram: identity, relationship graph, content, feed
//! assembly and moderation, written as pure orchestration over the storage
//! ports in `domains`. No component caches state; every call reads through
//! to the store.

pub mod content;
pub mod feed;
pub mod graph;
pub mod identity;
pub mod ids;
pub mod moderation;
pub mod profiles;

use std::sync::Arc;

use domains::{Clock, ContentRepository, DomainError, GraphRepository, Result, UserRepository};

pub use content::ContentStore;
pub use feed::FeedAssembler;
pub use graph::RelationshipGraph;
pub use identity::IdentityStore;
pub use ids::{IdAllocator, IdSource, RandomIdSource};
pub use moderation::ModerationGate;
pub use profiles::ProfileView;

/// Every component wired to the same store.
pub struct Services {
    pub identity: IdentityStore,
    pub graph: RelationshipGraph,
    pub content: ContentStore,
    pub feed: FeedAssembler,
    pub moderation: ModerationGate,
    pub profiles: ProfileView,
}

impl Services {
    /// Wires all components to a single adapter implementing every port.
    pub fn new<S>(store: Arc<S>, ids: IdAllocator, clock: Arc<dyn Clock>) -> Self
    where
        S: UserRepository + GraphRepository + ContentRepository + 'static,
    {
        Self::from_parts(store.clone(), store.clone(), store, ids, clock)
    }

    pub fn from_parts(
        users: Arc<dyn UserRepository>,
        graph: Arc<dyn GraphRepository>,
        content: Arc<dyn ContentRepository>,
        ids: IdAllocator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let moderation = ModerationGate::new(graph.clone());

        Self {
            identity: IdentityStore::new(users.clone(), ids.clone()),
            graph: RelationshipGraph::new(users.clone(), graph.clone(), clock.clone()),
            content: ContentStore::new(users.clone(), content.clone(), ids, clock),
            feed: FeedAssembler::new(
                users.clone(),
                graph.clone(),
                content.clone(),
                moderation.clone(),
            ),
            profiles: ProfileView::new(users, graph, content),
            moderation,
        }
    }
}

/// Rejects empty identifiers before they reach the store.
pub(crate) fn require_id(id: &impl AsRef<str>, what: &str) -> Result<()> {
    if id.as_ref().is_empty() {
        return Err(DomainError::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(())
}

pub(crate) fn require_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(DomainError::InvalidArgument(
            "username must not be blank".to_owned(),
        ));
    }
    Ok(())
}
