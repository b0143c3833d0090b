//! # Domain Models
//!
//! These structs represent the core entities of Photogram.
//! Ownership is strict: users belong to the identity store, follow and ban
//! edges to the relationship graph, photos/likes/comments to the content store.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CommentId, PhotoId, UserId};

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Globally unique, mutable display handle
    pub username: String,
}

/// Directed edge: `follower` sees `followed`'s photos in their stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower: UserId,
    pub followed: UserId,
}

/// Directed edge: `banner` no longer wants to see `banned`'s content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEdge {
    pub banner: UserId,
    pub banned: UserId,
    pub created_at: DateTime<Utc>,
}

/// An uploaded image. The payload is stored opaquely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub owner: UserId,
    pub image: Bytes,
    pub created_at: DateTime<Utc>,
}

/// One user's like on one photo. Unique per (user, photo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub user: UserId,
    pub photo: PhotoId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: UserId,
    pub photo: PhotoId,
    /// Stored verbatim
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Everything a client needs to render a single photo page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoDetail {
    pub photo: Photo,
    pub owner_username: String,
    pub like_count: u64,
    /// Newest first
    pub comments: Vec<Comment>,
}

/// Result of a login attempt that may have created the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub user: User,
    /// True when this call registered a new identity
    pub created: bool,
}

/// Public profile view assembled from identity, graph and content state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user: User,
    pub followers: Vec<UserId>,
    pub following: Vec<UserId>,
    /// Newest first
    pub photos: Vec<PhotoId>,
}
