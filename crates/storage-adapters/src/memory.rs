//! # MemoryStore
//!
//! In-process implementation of every storage port. It enforces the same
//! uniqueness and foreign-key rules as the SQL schema, so the services
//! behave identically against it. Used by tests and by the `memory`
//! backend for throwaway deployments.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use domains::{
    BanEdge, Comment, CommentId, Constraint, ContentRepository, FollowEdge, GraphRepository, Like,
    Photo, PhotoId, StoreError, User, UserId, UserRepository,
};
use tokio::sync::RwLock;
use tracing::warn;

/// A step of the photo cascade, for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    Comments,
    Likes,
    Photo,
}

/// A value plus its insertion sequence, used to break timestamp ties.
#[derive(Debug, Clone)]
struct Row<T> {
    seq: u64,
    value: T,
}

#[derive(Default)]
struct Tables {
    next_seq: u64,
    users: BTreeMap<UserId, User>,
    usernames: HashMap<String, UserId>,
    follows: BTreeSet<(UserId, UserId)>,
    bans: Vec<Row<BanEdge>>,
    photos: HashMap<PhotoId, Row<Photo>>,
    likes: HashMap<(UserId, PhotoId), Like>,
    comments: HashMap<CommentId, Row<Comment>>,
    /// One-shot failure for the next photo cascade
    cascade_fault: Option<CascadeStep>,
}

impl Tables {
    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn require_user(&self, id: &UserId, column: &str) -> Result<(), StoreError> {
        if self.users.contains_key(id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(column.to_owned()))
        }
    }

    fn require_photo(&self, id: &PhotoId, column: &str) -> Result<(), StoreError> {
        if self.photos.contains_key(id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(column.to_owned()))
        }
    }

    fn trip(&mut self, step: CascadeStep) -> Result<(), StoreError> {
        if self.cascade_fault == Some(step) {
            self.cascade_fault = None;
            warn!(?step, "injected cascade fault");
            return Err(StoreError::Backend(format!(
                "injected failure while deleting {step:?}"
            )));
        }
        Ok(())
    }
}

/// Newest first, later insertion first on equal timestamps.
fn newest_first<T: Clone>(rows: Vec<&Row<T>>, created_at: impl Fn(&T) -> i64) -> Vec<T> {
    let mut rows = rows;
    rows.sort_by(|a, b| {
        created_at(&b.value)
            .cmp(&created_at(&a.value))
            .then(b.seq.cmp(&a.seq))
    });
    rows.into_iter().map(|row| row.value.clone()).collect()
}

/// Thread-safe in-memory store. Every operation takes the table lock once,
/// so each call is atomic with respect to every other.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `delete_photo_cascade` fail at `step`, after the
    /// earlier steps have already been applied to the working copy.
    pub async fn fail_cascade_at(&self, step: CascadeStep) {
        self.tables.write().await.cascade_fault = Some(step);
    }

    /// Number of likes referencing `photo`, including orphans.
    pub async fn likes_referencing(&self, photo: &PhotoId) -> usize {
        let tables = self.tables.read().await;
        tables.likes.keys().filter(|(_, p)| p == photo).count()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id) {
            return Err(StoreError::UniqueViolation(Constraint::UserId));
        }
        if tables.usernames.contains_key(&user.username) {
            return Err(StoreError::UniqueViolation(Constraint::Username));
        }
        tables.usernames.insert(user.username.clone(), user.id.clone());
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn user_id_exists(&self, id: &UserId) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.users.contains_key(id))
    }

    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .usernames
            .get(username)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn update_username(&self, id: &UserId, username: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(current) = tables.users.get(id).map(|u| u.username.clone()) else {
            return Ok(false);
        };
        if current == username {
            return Ok(true);
        }
        if tables.usernames.contains_key(username) {
            return Err(StoreError::UniqueViolation(Constraint::Username));
        }

        tables.usernames.remove(&current);
        tables.usernames.insert(username.to_owned(), id.clone());
        if let Some(user) = tables.users.get_mut(id) {
            user.username = username.to_owned();
        }
        Ok(true)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl GraphRepository for MemoryStore {
    async fn insert_follow(&self, edge: &FollowEdge) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.require_user(&edge.follower, "follows.follower_id")?;
        tables.require_user(&edge.followed, "follows.followed_id")?;
        if !tables
            .follows
            .insert((edge.follower.clone(), edge.followed.clone()))
        {
            return Err(StoreError::UniqueViolation(Constraint::Follow));
        }
        Ok(())
    }

    async fn delete_follow(&self, follower: &UserId, followed: &UserId) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .follows
            .remove(&(follower.clone(), followed.clone()));
        Ok(())
    }

    async fn follow_exists(&self, follower: &UserId, followed: &UserId) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .follows
            .contains(&(follower.clone(), followed.clone())))
    }

    async fn followers_of(&self, user: &UserId) -> Result<Vec<UserId>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|(_, followed)| followed == user)
            .map(|(follower, _)| follower.clone())
            .collect())
    }

    async fn following_of(&self, user: &UserId) -> Result<Vec<UserId>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .follows
            .iter()
            .filter(|(follower, _)| follower == user)
            .map(|(_, followed)| followed.clone())
            .collect())
    }

    async fn insert_ban(&self, edge: &BanEdge) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.require_user(&edge.banner, "bans.banner_id")?;
        tables.require_user(&edge.banned, "bans.banned_id")?;
        if tables
            .bans
            .iter()
            .any(|row| row.value.banner == edge.banner && row.value.banned == edge.banned)
        {
            return Err(StoreError::UniqueViolation(Constraint::Ban));
        }
        let seq = tables.seq();
        tables.bans.push(Row {
            seq,
            value: edge.clone(),
        });
        Ok(())
    }

    async fn delete_ban(&self, banner: &UserId, banned: &UserId) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .bans
            .retain(|row| !(&row.value.banner == banner && &row.value.banned == banned));
        Ok(())
    }

    async fn ban_exists(&self, banner: &UserId, banned: &UserId) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .bans
            .iter()
            .any(|row| &row.value.banner == banner && &row.value.banned == banned))
    }

    async fn list_bans(&self) -> Result<Vec<BanEdge>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<&Row<BanEdge>> = tables.bans.iter().collect();
        rows.sort_by(|a, b| {
            a.value
                .created_at
                .cmp(&b.value.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        Ok(rows.into_iter().map(|row| row.value.clone()).collect())
    }
}

#[async_trait]
impl ContentRepository for MemoryStore {
    async fn insert_photo(&self, photo: &Photo) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.photos.contains_key(&photo.id) {
            return Err(StoreError::UniqueViolation(Constraint::PhotoId));
        }
        tables.require_user(&photo.owner, "photos.owner_id")?;
        let seq = tables.seq();
        tables.photos.insert(
            photo.id.clone(),
            Row {
                seq,
                value: photo.clone(),
            },
        );
        Ok(())
    }

    async fn photo_id_exists(&self, id: &PhotoId) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.photos.contains_key(id))
    }

    async fn find_photo(&self, id: &PhotoId) -> Result<Option<Photo>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .photos
            .get(id)
            .map(|row| row.value.clone()))
    }

    async fn list_photos(&self) -> Result<Vec<Photo>, StoreError> {
        let tables = self.tables.read().await;
        Ok(newest_first(tables.photos.values().collect(), |p| {
            p.created_at.timestamp_micros()
        }))
    }

    async fn photos_by_owners(&self, owners: &[UserId]) -> Result<Vec<Photo>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .photos
            .values()
            .filter(|row| owners.contains(&row.value.owner))
            .collect();
        Ok(newest_first(rows, |p| p.created_at.timestamp_micros()))
    }

    async fn delete_photo_cascade(&self, id: &PhotoId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.photos.contains_key(id) {
            return Ok(false);
        }

        // Work on copies and swap them in only once every step succeeded.
        let mut comments = tables.comments.clone();
        let mut likes = tables.likes.clone();
        let mut photos = tables.photos.clone();

        // 1. Comments
        comments.retain(|_, row| &row.value.photo != id);
        tables.trip(CascadeStep::Comments)?;

        // 2. Likes
        likes.retain(|(_, photo), _| photo != id);
        tables.trip(CascadeStep::Likes)?;

        // 3. Photo
        photos.remove(id);
        tables.trip(CascadeStep::Photo)?;

        tables.comments = comments;
        tables.likes = likes;
        tables.photos = photos;
        Ok(true)
    }

    async fn insert_like(&self, like: &Like) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.require_user(&like.user, "likes.user_id")?;
        tables.require_photo(&like.photo, "likes.photo_id")?;
        let key = (like.user.clone(), like.photo.clone());
        if tables.likes.contains_key(&key) {
            return Err(StoreError::UniqueViolation(Constraint::Like));
        }
        tables.likes.insert(key, like.clone());
        Ok(())
    }

    async fn delete_like(&self, user: &UserId, photo: &PhotoId) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .likes
            .remove(&(user.clone(), photo.clone()));
        Ok(())
    }

    async fn like_exists(&self, user: &UserId, photo: &PhotoId) -> Result<bool, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .likes
            .contains_key(&(user.clone(), photo.clone())))
    }

    async fn count_likes(&self, photo: &PhotoId) -> Result<u64, StoreError> {
        Ok(self.likes_referencing(photo).await as u64)
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.comments.contains_key(&comment.id) {
            return Err(StoreError::UniqueViolation(Constraint::CommentId));
        }
        tables.require_user(&comment.author, "comments.user_id")?;
        tables.require_photo(&comment.photo, "comments.photo_id")?;
        let seq = tables.seq();
        tables.comments.insert(
            comment.id.clone(),
            Row {
                seq,
                value: comment.clone(),
            },
        );
        Ok(())
    }

    async fn comment_id_exists(&self, id: &CommentId) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.comments.contains_key(id))
    }

    async fn delete_comment(&self, id: &CommentId) -> Result<bool, StoreError> {
        Ok(self.tables.write().await.comments.remove(id).is_some())
    }

    async fn comments_of(&self, photo: &PhotoId) -> Result<Vec<Comment>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables
            .comments
            .values()
            .filter(|row| &row.value.photo == photo)
            .collect();
        Ok(newest_first(rows, |c| c.created_at.timestamp_micros()))
    }
}
