//! # Id Allocation
//!
//! Fresh ids are random alphanumeric strings. Uniqueness is enforced by the
//! store: a candidate is checked for existence, then inserted, and either a
//! hit or a unique-violation on the id column sends us round again. The loop
//! is bounded so an exhausted id space surfaces as a storage failure instead
//! of spinning.

use std::future::Future;
use std::sync::Arc;

use domains::{Constraint, StoreError};
use rand::distr::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};

/// Length of generated ids in the reference schema.
pub const DEFAULT_ID_LENGTH: usize = 10;

/// Attempts before `IdAllocator::allocate` gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

/// Produces id candidates. Candidates need not be unique.
pub trait IdSource: Send + Sync {
    fn candidate(&self) -> String;
}

/// Uniform draws over `[A-Za-z0-9]` from the thread-local CSPRNG.
#[derive(Debug, Clone, Copy)]
pub struct RandomIdSource {
    length: usize,
}

impl RandomIdSource {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomIdSource {
    fn default() -> Self {
        Self::new(DEFAULT_ID_LENGTH)
    }
}

impl IdSource for RandomIdSource {
    fn candidate(&self) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

/// Collision-checked id generator shared by every component that mints ids.
#[derive(Clone)]
pub struct IdAllocator {
    source: Arc<dyn IdSource>,
    max_attempts: u32,
}

impl IdAllocator {
    pub fn new(source: Arc<dyn IdSource>, max_attempts: u32) -> Self {
        Self {
            source,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn random(length: usize, max_attempts: u32) -> Self {
        Self::new(Arc::new(RandomIdSource::new(length)), max_attempts)
    }

    /// Draws candidates until `insert` succeeds with one of them.
    ///
    /// `exists` is the cheap pre-check; `insert` performs the real write and
    /// may still lose a race, reported as `UniqueViolation(id_constraint)`.
    /// Any other error from either closure is returned untouched so the
    /// caller can translate it.
    pub async fn allocate<T, E, EFut, I, IFut>(
        &self,
        entity: &'static str,
        id_constraint: Constraint,
        mut exists: E,
        mut insert: I,
    ) -> Result<T, StoreError>
    where
        E: FnMut(String) -> EFut,
        EFut: Future<Output = Result<bool, StoreError>>,
        I: FnMut(String) -> IFut,
        IFut: Future<Output = Result<T, StoreError>>,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.source.candidate();

            if exists(candidate.clone()).await? {
                debug!(entity, attempt, "id candidate already taken");
                continue;
            }

            match insert(candidate).await {
                Err(StoreError::UniqueViolation(c)) if c == id_constraint => {
                    debug!(entity, attempt, "id candidate claimed concurrently");
                }
                other => return other,
            }
        }

        warn!(entity, attempts = self.max_attempts, "id allocation exhausted");
        Err(StoreError::Backend(format!(
            "exhausted {} attempts generating a unique {entity} id",
            self.max_attempts
        )))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::random(DEFAULT_ID_LENGTH, DEFAULT_MAX_ATTEMPTS)
    }
}
