//! # Storage Ports
//!
//! Any storage adapter must implement these traits to back the core.
//! Each trait is owned by exactly one component; other components only
//! read through it.
//!
//! # Developer Note
//! Uniqueness and referential integrity are the adapter's job. A write that
//! breaks a rule must come back as `StoreError::UniqueViolation` or
//! `StoreError::ForeignKeyViolation`, never as a silent overwrite, because
//! the services rely on the store as the final arbiter under concurrency.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::error::StoreError;
use crate::ids::{CommentId, PhotoId, UserId};
use crate::models::{BanEdge, Comment, FollowEdge, Like, Photo, User};

/// Persistence contract for user rows.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `UniqueViolation(UserId | Username)`.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn user_id_exists(&self, id: &UserId) -> Result<bool, StoreError>;
    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Returns `false` when no row has that id.
    async fn update_username(&self, id: &UserId, username: &str) -> Result<bool, StoreError>;
    /// Ordered by username.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    /// Cheap round trip proving the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Persistence contract for follow and ban edges.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait GraphRepository: Send + Sync {
    // Follow edges
    async fn insert_follow(&self, edge: &FollowEdge) -> Result<(), StoreError>;
    async fn delete_follow(&self, follower: &UserId, followed: &UserId) -> Result<(), StoreError>;
    async fn follow_exists(&self, follower: &UserId, followed: &UserId) -> Result<bool, StoreError>;
    async fn followers_of(&self, user: &UserId) -> Result<Vec<UserId>, StoreError>;
    async fn following_of(&self, user: &UserId) -> Result<Vec<UserId>, StoreError>;

    // Ban edges
    async fn insert_ban(&self, edge: &BanEdge) -> Result<(), StoreError>;
    async fn delete_ban(&self, banner: &UserId, banned: &UserId) -> Result<(), StoreError>;
    async fn ban_exists(&self, banner: &UserId, banned: &UserId) -> Result<bool, StoreError>;
    /// Oldest first, ties in insertion order.
    async fn list_bans(&self) -> Result<Vec<BanEdge>, StoreError>;
}

/// Persistence contract for photos and everything hanging off them.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait ContentRepository: Send + Sync {
    // Photos
    async fn insert_photo(&self, photo: &Photo) -> Result<(), StoreError>;
    async fn photo_id_exists(&self, id: &PhotoId) -> Result<bool, StoreError>;
    async fn find_photo(&self, id: &PhotoId) -> Result<Option<Photo>, StoreError>;
    /// Newest first, ties with the later insertion first.
    async fn list_photos(&self) -> Result<Vec<Photo>, StoreError>;
    /// Photos owned by any of `owners`, in `list_photos` order.
    async fn photos_by_owners(&self, owners: &[UserId]) -> Result<Vec<Photo>, StoreError>;
    /// Removes comments, likes and the photo as one all-or-nothing unit.
    /// Returns `false` when the photo does not exist.
    async fn delete_photo_cascade(&self, id: &PhotoId) -> Result<bool, StoreError>;

    // Likes
    async fn insert_like(&self, like: &Like) -> Result<(), StoreError>;
    async fn delete_like(&self, user: &UserId, photo: &PhotoId) -> Result<(), StoreError>;
    async fn like_exists(&self, user: &UserId, photo: &PhotoId) -> Result<bool, StoreError>;
    async fn count_likes(&self, photo: &PhotoId) -> Result<u64, StoreError>;

    // Comments
    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError>;
    async fn comment_id_exists(&self, id: &CommentId) -> Result<bool, StoreError>;
    /// Returns `false` when no comment has that id.
    async fn delete_comment(&self, id: &CommentId) -> Result<bool, StoreError>;
    /// Newest first, ties with the later insertion first.
    async fn comments_of(&self, photo: &PhotoId) -> Result<Vec<Comment>, StoreError>;
}

/// Source of creation timestamps.
#[cfg_attr(any(test, feature = "testing"), automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
