//! # Profile View
//!
//! Read-only views joining a user with their graph and content state.

use std::sync::Arc;

use domains::{
    ContentRepository, DomainError, GraphRepository, Result, User, UserProfile, UserRepository,
};

use crate::require_username;

pub struct ProfileView {
    users: Arc<dyn UserRepository>,
    graph: Arc<dyn GraphRepository>,
    content: Arc<dyn ContentRepository>,
}

impl ProfileView {
    pub fn new(
        users: Arc<dyn UserRepository>,
        graph: Arc<dyn GraphRepository>,
        content: Arc<dyn ContentRepository>,
    ) -> Self {
        Self {
            users,
            graph,
            content,
        }
    }

    /// The user plus follower ids, followed ids and owned photo ids.
    pub async fn profile(&self, username: &str) -> Result<UserProfile> {
        let user = self.find(username).await?;

        let mut followers = self.graph.followers_of(&user.id).await?;
        let mut following = self.graph.following_of(&user.id).await?;
        followers.sort();
        following.sort();

        let photos = self
            .content
            .photos_by_owners(std::slice::from_ref(&user.id))
            .await?
            .into_iter()
            .map(|photo| photo.id)
            .collect();

        Ok(UserProfile {
            user,
            followers,
            following,
            photos,
        })
    }

    /// Users following `username`, ordered by username.
    pub async fn followers_of_username(&self, username: &str) -> Result<Vec<User>> {
        let user = self.find(username).await?;

        let mut followers = Vec::new();
        for id in self.graph.followers_of(&user.id).await? {
            let follower = self.users.find_user_by_id(&id).await?.ok_or_else(|| {
                DomainError::Storage(format!("follow edge references missing user {id}"))
            })?;
            followers.push(follower);
        }
        followers.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(followers)
    }

    async fn find(&self, username: &str) -> Result<User> {
        require_username(username)?;
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found("user", username))
    }
}
