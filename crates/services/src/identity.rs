//! # Identity Store
//!
//! Registration, lookup and renaming of users. Username uniqueness is
//! decided by the store; this layer only translates the store's verdict.

use std::sync::Arc;

use domains::{
    Constraint, DomainError, LoginOutcome, Result, StoreError, User, UserId, UserRepository,
};
use tracing::{debug, info, instrument};

use crate::ids::IdAllocator;
use crate::{require_id, require_username};

pub struct IdentityStore {
    users: Arc<dyn UserRepository>,
    ids: IdAllocator,
}

impl IdentityStore {
    pub fn new(users: Arc<dyn UserRepository>, ids: IdAllocator) -> Self {
        Self { users, ids }
    }

    /// Creates a user with a freshly allocated id.
    ///
    /// Fails with `Conflict` when the username is already taken, including
    /// when a concurrent writer claimed it between our check and our insert.
    #[instrument(skip(self))]
    pub async fn register(&self, username: &str) -> Result<User> {
        require_username(username)?;
        let users = self.users.as_ref();

        let user = self
            .ids
            .allocate(
                "user",
                Constraint::UserId,
                |candidate| async move { users.user_id_exists(&UserId::from(candidate)).await },
                |candidate| {
                    let user = User {
                        id: UserId::from(candidate),
                        username: username.to_owned(),
                    };
                    async move { users.insert_user(&user).await.map(|()| user) }
                },
            )
            .await
            .map_err(|err| username_write_error(err, username))?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn lookup_by_username(&self, username: &str) -> Result<User> {
        require_username(username)?;
        self.users
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| DomainError::not_found("user", username))
    }

    pub async fn lookup_by_id(&self, id: &UserId) -> Result<User> {
        require_id(id, "user id")?;
        self.users
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", id))
    }

    /// Changes a user's username. Renaming to the current name is a no-op.
    #[instrument(skip(self))]
    pub async fn rename(&self, id: &UserId, new_username: &str) -> Result<()> {
        require_id(id, "user id")?;
        require_username(new_username)?;

        let current = self.lookup_by_id(id).await?;
        if current.username == new_username {
            debug!("username unchanged");
            return Ok(());
        }

        let updated = self
            .users
            .update_username(id, new_username)
            .await
            .map_err(|err| username_write_error(err, new_username))?;
        if !updated {
            return Err(DomainError::not_found("user", id));
        }

        info!(user_id = %id, "username changed");
        Ok(())
    }

    /// Returns the user named `username`, registering it first if needed.
    ///
    /// The lookup and the insert are not atomic; when two identical calls
    /// race, the store rejects the second insert and that caller re-reads
    /// the winner's row instead of failing.
    #[instrument(skip(self))]
    pub async fn login_or_register(&self, username: &str) -> Result<LoginOutcome> {
        require_username(username)?;

        if let Some(user) = self.users.find_user_by_username(username).await? {
            return Ok(LoginOutcome {
                user,
                created: false,
            });
        }

        match self.register(username).await {
            Ok(user) => Ok(LoginOutcome {
                user,
                created: true,
            }),
            Err(DomainError::Conflict(reason)) => {
                debug!("lost registration race, re-reading");
                match self.users.find_user_by_username(username).await? {
                    Some(user) => Ok(LoginOutcome {
                        user,
                        created: false,
                    }),
                    None => Err(DomainError::Conflict(reason)),
                }
            }
            Err(err) => Err(err),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.list_users().await?)
    }

    /// Checks that the backing store answers.
    pub async fn ping(&self) -> Result<()> {
        Ok(self.users.ping().await?)
    }
}

fn username_write_error(err: StoreError, username: &str) -> DomainError {
    match err {
        StoreError::UniqueViolation(Constraint::Username) => {
            DomainError::Conflict(format!("username {username:?} is already taken"))
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::tests::ScriptedIds;
    use domains::{ErrorKind, MockUserRepository};
    use mockall::predicate::eq;

    fn store(users: MockUserRepository, ids: &[&str]) -> IdentityStore {
        IdentityStore::new(
            Arc::new(users),
            IdAllocator::new(Arc::new(ScriptedIds::new(ids)), 4),
        )
    }

    fn alice() -> User {
        User {
            id: UserId::from("aaaaaaaaaa"),
            username: "alice".into(),
        }
    }

    #[tokio::test]
    async fn test_register_retries_on_id_collision() {
        let mut users = MockUserRepository::new();
        users
            .expect_user_id_exists()
            .returning(|id| Ok(id.as_str() == "collision1"));
        users
            .expect_insert_user()
            .times(1)
            .withf(|u| u.id.as_str() == "freshid001" && u.username == "alice")
            .returning(|_| Ok(()));

        let identity = store(users, &["collision1", "freshid001"]);
        let user = identity.register("alice").await.unwrap();

        assert_eq!(user.id.as_str(), "freshid001");
    }

    #[tokio::test]
    async fn test_register_translates_username_violation_into_conflict() {
        let mut users = MockUserRepository::new();
        users.expect_user_id_exists().returning(|_| Ok(false));
        users
            .expect_insert_user()
            .returning(|_| Err(StoreError::UniqueViolation(Constraint::Username)));

        let err = store(users, &["freshid001"])
            .register("alice")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_register_rejects_blank_username() {
        let err = store(MockUserRepository::new(), &["x"])
            .register("   ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_register_surfaces_backend_failure() {
        let mut users = MockUserRepository::new();
        users
            .expect_user_id_exists()
            .returning(|_| Err(StoreError::Backend("disk I/O error".into())));

        let err = store(users, &["x"]).register("alice").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }

    #[tokio::test]
    async fn test_login_returns_existing_user_without_insert() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_user_by_username()
            .with(eq("alice"))
            .returning(|_| Ok(Some(alice())));
        users.expect_insert_user().never();

        let outcome = store(users, &["x"]).login_or_register("alice").await.unwrap();
        assert!(!outcome.created);
        assert_eq!(outcome.user, alice());
    }

    #[tokio::test]
    async fn test_login_race_rereads_winner() {
        let mut users = MockUserRepository::new();
        let mut lookups = 0;
        users.expect_find_user_by_username().returning(move |_| {
            lookups += 1;
            Ok(if lookups == 1 { None } else { Some(alice()) })
        });
        users.expect_user_id_exists().returning(|_| Ok(false));
        users
            .expect_insert_user()
            .returning(|_| Err(StoreError::UniqueViolation(Constraint::Username)));

        let outcome = store(users, &["bbbbbbbbbb"])
            .login_or_register("alice")
            .await
            .unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.user.id, alice().id);
    }

    #[tokio::test]
    async fn test_rename_to_taken_name_is_conflict() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_user_by_id()
            .returning(|_| Ok(Some(alice())));
        users
            .expect_update_username()
            .returning(|_, _| Err(StoreError::UniqueViolation(Constraint::Username)));

        let err = store(users, &["x"])
            .rename(&alice().id, "bob")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_rename_unknown_user_is_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_find_user_by_id().returning(|_| Ok(None));

        let err = store(users, &["x"])
            .rename(&UserId::from("ghost00000"), "bob")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
