//! # Feed Assembler
//!
//! A viewer's stream: photos of everyone they follow, minus owners the
//! viewer has banned, newest first. Recomputed on every call.

use std::sync::Arc;

use domains::{
    ContentRepository, DomainError, GraphRepository, Photo, PhotoId, Result, UserId,
    UserRepository,
};
use tracing::{debug, instrument};

use crate::moderation::ModerationGate;
use crate::require_id;

pub struct FeedAssembler {
    users: Arc<dyn UserRepository>,
    graph: Arc<dyn GraphRepository>,
    content: Arc<dyn ContentRepository>,
    gate: ModerationGate,
}

impl FeedAssembler {
    pub fn new(
        users: Arc<dyn UserRepository>,
        graph: Arc<dyn GraphRepository>,
        content: Arc<dyn ContentRepository>,
        gate: ModerationGate,
    ) -> Self {
        Self {
            users,
            graph,
            content,
            gate,
        }
    }

    /// Photo ids in stream order.
    pub async fn stream_for(&self, viewer: &UserId) -> Result<Vec<PhotoId>> {
        Ok(self
            .stream_photos_for(viewer)
            .await?
            .into_iter()
            .map(|photo| photo.id)
            .collect())
    }

    /// The photos themselves, in stream order.
    #[instrument(skip(self))]
    pub async fn stream_photos_for(&self, viewer: &UserId) -> Result<Vec<Photo>> {
        require_id(viewer, "viewer id")?;
        if !self.users.user_id_exists(viewer).await? {
            return Err(DomainError::not_found("user", viewer));
        }

        let following = self.graph.following_of(viewer).await?;
        let owners = self.gate.retain_visible(viewer, following).await?;
        if owners.is_empty() {
            debug!("no visible followed users");
            return Ok(Vec::new());
        }

        let photos = self.content.photos_by_owners(&owners).await?;
        debug!(owners = owners.len(), photos = photos.len(), "stream assembled");
        Ok(photos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};
    use domains::{MockContentRepository, MockGraphRepository, MockUserRepository};

    fn photo(id: &str, owner: &str, secs: i64) -> Photo {
        Photo {
            id: PhotoId::from(id),
            owner: UserId::from(owner),
            image: Bytes::from_static(b"img"),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_banned_owner_is_never_queried() {
        let mut users = MockUserRepository::new();
        users.expect_user_id_exists().returning(|_| Ok(true));

        let mut graph = MockGraphRepository::new();
        graph
            .expect_following_of()
            .returning(|_| Ok(vec![UserId::from("alice00000"), UserId::from("carol00000")]));
        graph
            .expect_ban_exists()
            .returning(|_, owner| Ok(owner.as_str() == "carol00000"));
        let graph: Arc<dyn GraphRepository> = Arc::new(graph);

        let mut content = MockContentRepository::new();
        content
            .expect_photos_by_owners()
            .withf(|owners| owners.len() == 1 && owners[0].as_str() == "alice00000")
            .returning(|_| Ok(vec![photo("p2", "alice00000", 20), photo("p1", "alice00000", 10)]));

        let feed = FeedAssembler::new(
            Arc::new(users),
            graph.clone(),
            Arc::new(content),
            ModerationGate::new(graph),
        );

        let stream = feed.stream_for(&UserId::from("bob0000000")).await.unwrap();
        assert_eq!(stream, vec![PhotoId::from("p2"), PhotoId::from("p1")]);
    }

    #[tokio::test]
    async fn test_unknown_viewer_is_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_user_id_exists().returning(|_| Ok(false));
        let graph: Arc<dyn GraphRepository> = Arc::new(MockGraphRepository::new());

        let feed = FeedAssembler::new(
            Arc::new(users),
            graph.clone(),
            Arc::new(MockContentRepository::new()),
            ModerationGate::new(graph),
        );

        let err = feed.stream_for(&UserId::from("ghost00000")).await.unwrap_err();
        assert_eq!(err.kind(), domains::ErrorKind::NotFound);
    }
}
