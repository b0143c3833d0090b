//! Populates the configured SQLite database with a few demo users, follows,
//! photos, likes and comments. Safe to run twice: existing users are reused.

use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use configs::Settings;
use domains::{SystemClock, User};
use services::{IdAllocator, Services};
use storage_adapters::SqliteStore;
use tracing::info;

const USERNAMES: [&str; 4] = ["alice", "bob", "carol", "dave"];

// Smallest valid PNG: 1x1 transparent pixel
const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = Settings::load().context("loading settings")?;
    let store = SqliteStore::connect(&settings.database.url, settings.database.max_connections)
        .await
        .with_context(|| format!("opening {}", settings.database.url))?;
    let services = Services::new(
        Arc::new(store),
        IdAllocator::random(settings.ids.length, settings.ids.max_attempts),
        Arc::new(SystemClock),
    );

    let mut users: Vec<User> = Vec::with_capacity(USERNAMES.len());
    for name in USERNAMES {
        let outcome = services.identity.login_or_register(name).await?;
        info!(username = name, created = outcome.created, "user ready");
        users.push(outcome.user);
    }

    // Everyone follows the next user around the ring
    for (i, user) in users.iter().enumerate() {
        let next = &users[(i + 1) % users.len()];
        services.graph.follow(&user.id, &next.id).await?;
    }

    for user in &users {
        let photo = services
            .content
            .upload_photo(&user.id, Bytes::from_static(PIXEL_PNG))
            .await?;
        for other in users.iter().filter(|other| other.id != user.id) {
            services.content.like(&other.id, &photo.id).await?;
        }
        let first_fan = users.iter().find(|other| other.id != user.id);
        if let Some(fan) = first_fan {
            services
                .content
                .add_comment(&fan.id, &photo.id, &format!("great shot, {}", user.username))
                .await?;
        }
    }

    info!(users = users.len(), "seed complete");
    Ok(())
}
