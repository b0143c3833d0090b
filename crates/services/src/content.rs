//! # Content Store
//!
//! Photos, likes and comments. Deleting a photo takes its likes and
//! comments with it in one transaction owned by the adapter.

use std::sync::Arc;

use bytes::Bytes;
use domains::{
    Clock, Comment, CommentId, Constraint, ContentRepository, DomainError, Like, Photo,
    PhotoDetail, PhotoId, Result, StoreError, UserId, UserRepository,
};
use tracing::{debug, error, info, instrument};

use crate::ids::IdAllocator;
use crate::require_id;

pub struct ContentStore {
    users: Arc<dyn UserRepository>,
    content: Arc<dyn ContentRepository>,
    ids: IdAllocator,
    clock: Arc<dyn Clock>,
}

impl ContentStore {
    pub fn new(
        users: Arc<dyn UserRepository>,
        content: Arc<dyn ContentRepository>,
        ids: IdAllocator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            content,
            ids,
            clock,
        }
    }

    // ── Photos ──────────────────────────────────────────────────────────────

    /// Stores `image` for `owner` under a fresh id, timestamped now.
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    pub async fn upload_photo(&self, owner: &UserId, image: Bytes) -> Result<Photo> {
        require_id(owner, "owner id")?;
        if image.is_empty() {
            return Err(DomainError::InvalidArgument(
                "image payload must not be empty".to_owned(),
            ));
        }
        self.ensure_user(owner).await?;

        let content = self.content.as_ref();
        let created_at = self.clock.now();
        let photo = self
            .ids
            .allocate(
                "photo",
                Constraint::PhotoId,
                |candidate| async move { content.photo_id_exists(&PhotoId::from(candidate)).await },
                |candidate| {
                    let photo = Photo {
                        id: PhotoId::from(candidate),
                        owner: owner.clone(),
                        image: image.clone(),
                        created_at,
                    };
                    async move { content.insert_photo(&photo).await.map(|()| photo) }
                },
            )
            .await
            .map_err(|err| missing_reference(err, "user", owner))?;

        info!(photo_id = %photo.id, "photo uploaded");
        Ok(photo)
    }

    /// Photo, owner's username, like count and comments (newest first).
    pub async fn get_photo(&self, id: &PhotoId) -> Result<PhotoDetail> {
        require_id(id, "photo id")?;
        let photo = self
            .content
            .find_photo(id)
            .await?
            .ok_or_else(|| DomainError::not_found("photo", id))?;

        let owner = self.users.find_user_by_id(&photo.owner).await?.ok_or_else(|| {
            DomainError::Storage(format!("photo {id} references missing owner {}", photo.owner))
        })?;
        let like_count = self.content.count_likes(id).await?;
        let comments = self.content.comments_of(id).await?;

        Ok(PhotoDetail {
            photo,
            owner_username: owner.username,
            like_count,
            comments,
        })
    }

    /// Every photo, newest first. Unfiltered.
    pub async fn list_all_photos(&self) -> Result<Vec<Photo>> {
        Ok(self.content.list_photos().await?)
    }

    /// Photos uploaded by `owner`, newest first.
    pub async fn photos_of(&self, owner: &UserId) -> Result<Vec<Photo>> {
        require_id(owner, "owner id")?;
        self.ensure_user(owner).await?;
        Ok(self
            .content
            .photos_by_owners(std::slice::from_ref(owner))
            .await?)
    }

    /// Deletes the photo together with its comments and likes.
    ///
    /// # Developer Note
    /// The adapter runs the three deletes in one transaction, so a failure
    /// here means nothing was removed.
    #[instrument(skip(self))]
    pub async fn delete_photo(&self, id: &PhotoId) -> Result<()> {
        require_id(id, "photo id")?;
        match self.content.delete_photo_cascade(id).await {
            Ok(true) => {
                info!("photo deleted with its likes and comments");
                Ok(())
            }
            Ok(false) => Err(DomainError::not_found("photo", id)),
            Err(err) => {
                error!(error = %err, "photo cascade rolled back");
                Err(DomainError::Storage(err.to_string()))
            }
        }
    }

    // ── Likes ───────────────────────────────────────────────────────────────

    /// A second like by the same user on the same photo is a `Conflict`.
    #[instrument(skip(self))]
    pub async fn like(&self, user: &UserId, photo: &PhotoId) -> Result<()> {
        require_id(user, "user id")?;
        require_id(photo, "photo id")?;
        self.ensure_user(user).await?;
        self.ensure_photo(photo).await?;

        if self.content.like_exists(user, photo).await? {
            return Err(duplicate_like(photo));
        }

        let like = Like {
            user: user.clone(),
            photo: photo.clone(),
            created_at: self.clock.now(),
        };
        match self.content.insert_like(&like).await {
            Ok(()) => {
                info!("photo liked");
                Ok(())
            }
            Err(StoreError::UniqueViolation(Constraint::Like)) => Err(duplicate_like(photo)),
            Err(err) => Err(missing_reference(err, "photo", photo)),
        }
    }

    #[instrument(skip(self))]
    pub async fn unlike(&self, user: &UserId, photo: &PhotoId) -> Result<()> {
        require_id(user, "user id")?;
        require_id(photo, "photo id")?;
        self.content.delete_like(user, photo).await?;
        Ok(())
    }

    pub async fn is_liked(&self, user: &UserId, photo: &PhotoId) -> Result<bool> {
        require_id(user, "user id")?;
        require_id(photo, "photo id")?;
        Ok(self.content.like_exists(user, photo).await?)
    }

    // ── Comments ────────────────────────────────────────────────────────────

    /// Stores `body` verbatim. Blank bodies are rejected by the transport.
    #[instrument(skip(self, body))]
    pub async fn add_comment(&self, user: &UserId, photo: &PhotoId, body: &str) -> Result<Comment> {
        require_id(user, "user id")?;
        require_id(photo, "photo id")?;
        self.ensure_user(user).await?;
        self.ensure_photo(photo).await?;

        let content = self.content.as_ref();
        let created_at = self.clock.now();
        let comment = self
            .ids
            .allocate(
                "comment",
                Constraint::CommentId,
                |candidate| async move {
                    content.comment_id_exists(&CommentId::from(candidate)).await
                },
                |candidate| {
                    let comment = Comment {
                        id: CommentId::from(candidate),
                        author: user.clone(),
                        photo: photo.clone(),
                        body: body.to_owned(),
                        created_at,
                    };
                    async move { content.insert_comment(&comment).await.map(|()| comment) }
                },
            )
            .await
            .map_err(|err| missing_reference(err, "photo", photo))?;

        info!(comment_id = %comment.id, "comment added");
        Ok(comment)
    }

    #[instrument(skip(self))]
    pub async fn remove_comment(&self, id: &CommentId) -> Result<()> {
        require_id(id, "comment id")?;
        if self.content.delete_comment(id).await? {
            info!("comment removed");
            Ok(())
        } else {
            debug!("no such comment");
            Err(DomainError::not_found("comment", id))
        }
    }

    /// Comments on `photo`, newest first. Empty for unknown photos.
    pub async fn comments_of(&self, photo: &PhotoId) -> Result<Vec<Comment>> {
        require_id(photo, "photo id")?;
        Ok(self.content.comments_of(photo).await?)
    }

    async fn ensure_user(&self, id: &UserId) -> Result<()> {
        if self.users.user_id_exists(id).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("user", id))
        }
    }

    async fn ensure_photo(&self, id: &PhotoId) -> Result<()> {
        if self.content.photo_id_exists(id).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("photo", id))
        }
    }
}

fn duplicate_like(photo: &PhotoId) -> DomainError {
    DomainError::Conflict(format!("photo {photo} is already liked"))
}

/// The referenced row disappeared between our check and the write.
fn missing_reference(err: StoreError, entity: &'static str, id: &impl std::fmt::Display) -> DomainError {
    match err {
        StoreError::ForeignKeyViolation(_) => DomainError::not_found(entity, id),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::tests::ScriptedIds;
    use chrono::Utc;
    use domains::{ErrorKind, MockClock, MockContentRepository, MockUserRepository};

    fn store(users: MockUserRepository, content: MockContentRepository) -> ContentStore {
        let mut clock = MockClock::new();
        clock.expect_now().returning(Utc::now);
        ContentStore::new(
            Arc::new(users),
            Arc::new(content),
            IdAllocator::new(Arc::new(ScriptedIds::new(&["pppppppppp"])), 4),
            Arc::new(clock),
        )
    }

    fn everyone_exists() -> MockUserRepository {
        let mut users = MockUserRepository::new();
        users.expect_user_id_exists().returning(|_| Ok(true));
        users
    }

    #[tokio::test]
    async fn test_upload_rejects_empty_payload() {
        let err = store(MockUserRepository::new(), MockContentRepository::new())
            .upload_photo(&UserId::from("aaaaaaaaaa"), Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_upload_owner_deleted_mid_flight_is_not_found() {
        let mut content = MockContentRepository::new();
        content.expect_photo_id_exists().returning(|_| Ok(false));
        content
            .expect_insert_photo()
            .returning(|_| Err(StoreError::ForeignKeyViolation("photos.owner_id".into())));

        let err = store(everyone_exists(), content)
            .upload_photo(&UserId::from("aaaaaaaaaa"), Bytes::from_static(b"img"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_like_race_on_unique_key_is_conflict() {
        let mut content = MockContentRepository::new();
        content.expect_photo_id_exists().returning(|_| Ok(true));
        content.expect_like_exists().returning(|_, _| Ok(false));
        content
            .expect_insert_like()
            .returning(|_| Err(StoreError::UniqueViolation(Constraint::Like)));

        let err = store(everyone_exists(), content)
            .like(&UserId::from("aaaaaaaaaa"), &PhotoId::from("pppppppppp"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_failed_cascade_surfaces_storage_failure() {
        let mut content = MockContentRepository::new();
        content
            .expect_delete_photo_cascade()
            .returning(|_| Err(StoreError::Backend("transaction aborted".into())));

        let err = store(MockUserRepository::new(), content)
            .delete_photo(&PhotoId::from("pppppppppp"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }

    #[tokio::test]
    async fn test_remove_missing_comment_is_not_found() {
        let mut content = MockContentRepository::new();
        content.expect_delete_comment().returning(|_| Ok(false));

        let err = store(MockUserRepository::new(), content)
            .remove_comment(&CommentId::from("cccccccccc"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_get_photo_for_missing_owner_is_storage_failure() {
        let mut content = MockContentRepository::new();
        content.expect_find_photo().returning(|id| {
            Ok(Some(Photo {
                id: id.clone(),
                owner: UserId::from("gone000000"),
                image: Bytes::from_static(b"img"),
                created_at: Utc::now(),
            }))
        });
        let mut users = MockUserRepository::new();
        users.expect_find_user_by_id().returning(|_| Ok(None));

        let err = store(users, content)
            .get_photo(&PhotoId::from("pppppppppp"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }

    #[tokio::test]
    async fn test_is_liked_rejects_empty_ids() {
        let mut content = MockContentRepository::new();
        content.expect_like_exists().never();
        let store = store(MockUserRepository::new(), content);

        let err = store
            .is_liked(&UserId::from(""), &PhotoId::from("pppppppppp"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = store
            .is_liked(&UserId::from("aaaaaaaaaa"), &PhotoId::from(""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
