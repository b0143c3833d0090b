//! Shared fixtures for the cross-crate behaviour tests.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use domains::{Clock, ContentRepository, GraphRepository, Photo, User, UserRepository};
use services::{IdAllocator, Services};
use storage_adapters::MemoryStore;

/// Advances one second on every reading, so creation order is strictly
/// reflected in timestamps.
#[derive(Debug, Default)]
pub struct SteppingClock {
    ticks: AtomicI64,
}

impl SteppingClock {
    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        Self::epoch() + Duration::seconds(tick)
    }
}

/// Always reads the same instant, so every row ties on `created_at`.
#[derive(Debug, Default)]
pub struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        SteppingClock::epoch()
    }
}

pub fn services_with_clock<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> Services
where
    S: UserRepository + GraphRepository + ContentRepository + 'static,
{
    Services::new(store, IdAllocator::random(10, 16), clock)
}

pub fn services_over<S>(store: Arc<S>) -> Services
where
    S: UserRepository + GraphRepository + ContentRepository + 'static,
{
    services_with_clock(store, Arc::new(SteppingClock::default()))
}

/// Services over a fresh `MemoryStore`, with the store kept for inspection.
pub fn memory_services() -> (Services, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (services_over(store.clone()), store)
}

pub async fn user(services: &Services, name: &str) -> User {
    services
        .identity
        .register(name)
        .await
        .unwrap_or_else(|err| panic!("registering {name}: {err}"))
}

pub async fn photo(services: &Services, owner: &User) -> Photo {
    services
        .content
        .upload_photo(&owner.id, Bytes::from(format!("image by {}", owner.username)))
        .await
        .unwrap_or_else(|err| panic!("uploading for {}: {err}", owner.username))
}
