//! # Relationship Graph
//!
//! Follow and ban edges between users. Following is idempotent; banning
//! twice is reported, since a ban is an explicit moderation action.

use std::collections::BTreeSet;
use std::sync::Arc;

use domains::{
    BanEdge, Clock, Constraint, DomainError, FollowEdge, GraphRepository, Result, StoreError,
    UserId, UserRepository,
};
use tracing::{debug, info, instrument};

use crate::require_id;

pub struct RelationshipGraph {
    users: Arc<dyn UserRepository>,
    graph: Arc<dyn GraphRepository>,
    clock: Arc<dyn Clock>,
}

impl RelationshipGraph {
    pub fn new(
        users: Arc<dyn UserRepository>,
        graph: Arc<dyn GraphRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            graph,
            clock,
        }
    }

    /// Adds `follower -> followed`. Following someone already followed is `Ok`.
    #[instrument(skip(self))]
    pub async fn follow(&self, follower: &UserId, followed: &UserId) -> Result<()> {
        self.check_pair(follower, followed, "follow")?;
        self.ensure_user(follower).await?;
        self.ensure_user(followed).await?;

        let edge = FollowEdge {
            follower: follower.clone(),
            followed: followed.clone(),
        };
        match self.graph.insert_follow(&edge).await {
            Ok(()) => {
                info!("follow edge created");
                Ok(())
            }
            Err(StoreError::UniqueViolation(Constraint::Follow)) => {
                debug!("already following");
                Ok(())
            }
            Err(err) => Err(edge_write_error(err, follower, followed)),
        }
    }

    /// Removes `follower -> followed` if present.
    #[instrument(skip(self))]
    pub async fn unfollow(&self, follower: &UserId, followed: &UserId) -> Result<()> {
        require_id(follower, "follower id")?;
        require_id(followed, "followed id")?;
        self.graph.delete_follow(follower, followed).await?;
        Ok(())
    }

    pub async fn is_following(&self, follower: &UserId, followed: &UserId) -> Result<bool> {
        require_id(follower, "follower id")?;
        require_id(followed, "followed id")?;
        Ok(self.graph.follow_exists(follower, followed).await?)
    }

    pub async fn followers_of(&self, user: &UserId) -> Result<BTreeSet<UserId>> {
        require_id(user, "user id")?;
        Ok(self.graph.followers_of(user).await?.into_iter().collect())
    }

    pub async fn following_of(&self, user: &UserId) -> Result<BTreeSet<UserId>> {
        require_id(user, "user id")?;
        Ok(self.graph.following_of(user).await?.into_iter().collect())
    }

    /// Records that `banner` no longer wants to see `banned`.
    /// A ban that already exists is a `Conflict`.
    #[instrument(skip(self))]
    pub async fn ban(&self, banner: &UserId, banned: &UserId) -> Result<()> {
        self.check_pair(banner, banned, "ban")?;
        self.ensure_user(banner).await?;
        self.ensure_user(banned).await?;

        if self.graph.ban_exists(banner, banned).await? {
            return Err(already_banned(banned));
        }

        let edge = BanEdge {
            banner: banner.clone(),
            banned: banned.clone(),
            created_at: self.clock.now(),
        };
        match self.graph.insert_ban(&edge).await {
            Ok(()) => {
                info!("ban edge created");
                Ok(())
            }
            Err(StoreError::UniqueViolation(Constraint::Ban)) => Err(already_banned(banned)),
            Err(err) => Err(edge_write_error(err, banner, banned)),
        }
    }

    #[instrument(skip(self))]
    pub async fn unban(&self, banner: &UserId, banned: &UserId) -> Result<()> {
        require_id(banner, "banner id")?;
        require_id(banned, "banned id")?;
        self.graph.delete_ban(banner, banned).await?;
        Ok(())
    }

    pub async fn is_banned(&self, banner: &UserId, banned: &UserId) -> Result<bool> {
        require_id(banner, "banner id")?;
        require_id(banned, "banned id")?;
        Ok(self.graph.ban_exists(banner, banned).await?)
    }

    /// Every ban in the system, oldest first.
    pub async fn list_bans(&self) -> Result<Vec<BanEdge>> {
        Ok(self.graph.list_bans().await?)
    }

    fn check_pair(&self, from: &UserId, to: &UserId, action: &str) -> Result<()> {
        require_id(from, "user id")?;
        require_id(to, "target user id")?;
        if from == to {
            return Err(DomainError::InvalidArgument(format!(
                "a user cannot {action} themselves"
            )));
        }
        Ok(())
    }

    async fn ensure_user(&self, id: &UserId) -> Result<()> {
        if self.users.user_id_exists(id).await? {
            Ok(())
        } else {
            Err(DomainError::not_found("user", id))
        }
    }
}

fn already_banned(banned: &UserId) -> DomainError {
    DomainError::Conflict(format!("user {banned} is already banned"))
}

/// A user vanished between the existence check and the insert.
fn edge_write_error(err: StoreError, from: &UserId, to: &UserId) -> DomainError {
    match err {
        StoreError::ForeignKeyViolation(_) => DomainError::not_found("user", format!("{from} or {to}")),
        other => other.into(),
    }
}
