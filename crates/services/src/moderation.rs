//! # Moderation Gate
//!
//! The one place the ban-visibility rule lives. A viewer stops seeing the
//! content of anyone on the viewer's own ban list, whatever the follow
//! state. Every listing that needs moderation goes through `is_visible`.

use std::sync::Arc;

use domains::{GraphRepository, Result, UserId};

use crate::require_id;

#[derive(Clone)]
pub struct ModerationGate {
    graph: Arc<dyn GraphRepository>,
}

impl ModerationGate {
    pub fn new(graph: Arc<dyn GraphRepository>) -> Self {
        Self { graph }
    }

    /// `true` unless `viewer` has banned `owner`.
    pub async fn is_visible(&self, viewer: &UserId, owner: &UserId) -> Result<bool> {
        require_id(viewer, "viewer id")?;
        require_id(owner, "owner id")?;
        Ok(!self.graph.ban_exists(viewer, owner).await?)
    }

    /// Keeps the owners whose content `viewer` may see, preserving order.
    pub async fn retain_visible<I>(&self, viewer: &UserId, owners: I) -> Result<Vec<UserId>>
    where
        I: IntoIterator<Item = UserId>,
    {
        let mut visible = Vec::new();
        for owner in owners {
            if self.is_visible(viewer, &owner).await? {
                visible.push(owner);
            }
        }
        Ok(visible)
    }
}
