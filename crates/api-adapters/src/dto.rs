//! # Wire Types
//!
//! JSON shapes for the HTTP boundary. Core types never leak out directly;
//! each response is built from a typed result value.

use base64::Engine;
use chrono::{DateTime, Utc};
use domains::{BanEdge, Comment, Photo, PhotoDetail, User, UserProfile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct UsernameBody {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub user_id: String,
    pub username: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id.into_inner(),
            username: user.username,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub user_id: String,
    pub username: String,
    pub followers: Vec<String>,
    pub following: Vec<String>,
    pub photos: Vec<String>,
}

impl From<UserProfile> for ProfileDto {
    fn from(profile: UserProfile) -> Self {
        Self {
            user_id: profile.user.id.into_inner(),
            username: profile.user.username,
            followers: profile.followers.into_iter().map(|id| id.into_inner()).collect(),
            following: profile.following.into_iter().map(|id| id.into_inner()).collect(),
            photos: profile.photos.into_iter().map(|id| id.into_inner()).collect(),
        }
    }
}

/// Photo metadata without the payload, for listings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoSummaryDto {
    pub photo_id: String,
    pub owner_id: String,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
}

impl From<Photo> for PhotoSummaryDto {
    fn from(photo: Photo) -> Self {
        Self {
            size_bytes: photo.image.len(),
            photo_id: photo.id.into_inner(),
            owner_id: photo.owner.into_inner(),
            created_at: photo.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub comment_id: String,
    pub user_id: String,
    pub photo_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentDto {
    fn from(comment: Comment) -> Self {
        Self {
            comment_id: comment.id.into_inner(),
            user_id: comment.author.into_inner(),
            photo_id: comment.photo.into_inner(),
            content: comment.body,
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoDetailDto {
    pub photo_id: String,
    pub owner_id: String,
    pub owner_username: String,
    /// Standard base64 of the stored payload
    pub image_data: String,
    pub created_at: DateTime<Utc>,
    pub likes_count: u64,
    pub comments: Vec<CommentDto>,
}

impl From<PhotoDetail> for PhotoDetailDto {
    fn from(detail: PhotoDetail) -> Self {
        Self {
            image_data: base64::engine::general_purpose::STANDARD.encode(&detail.photo.image),
            photo_id: detail.photo.id.into_inner(),
            owner_id: detail.photo.owner.into_inner(),
            owner_username: detail.owner_username,
            created_at: detail.photo.created_at,
            likes_count: detail.like_count,
            comments: detail.comments.into_iter().map(CommentDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BanDto {
    pub banner_id: String,
    pub banned_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<BanEdge> for BanDto {
    fn from(ban: BanEdge) -> Self {
        Self {
            banner_id: ban.banner.into_inner(),
            banned_id: ban.banned.into_inner(),
            created_at: ban.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPhotoDto {
    pub photo_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCommentDto {
    pub comment_id: String,
}

#[derive(Debug, Serialize)]
pub struct LikedDto {
    pub liked: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
