//! # SqliteStore
//!
//! SQLite implementation of the storage ports via sqlx. The schema in
//! `migrations/` declares every uniqueness and foreign-key rule; this module
//! maps SQLite's constraint errors back onto `StoreError` so the services
//! can tell a duplicate username from an id collision.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use domains::{
    BanEdge, Comment, CommentId, Constraint, ContentRepository, FollowEdge, GraphRepository, Like,
    Photo, PhotoId, StoreError, User, UserId, UserRepository,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and runs migrations.
    ///
    /// # Developer Note
    /// Every connection to an in-memory database is a separate database, so
    /// in-memory URLs (`sqlite::memory:`, `sqlite://name?mode=memory`) are
    /// pinned to a single connection that never expires.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(map_sqlx)?
            .create_if_missing(true)
            .foreign_keys(true);

        let in_memory = is_in_memory_url(url);
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .idle_timeout(Duration::from_secs(600))
        };

        let pool = pool_options.connect_with(options).await.map_err(map_sqlx)?;
        let store = Self::from_pool(pool).await?;
        info!(url, in_memory, "sqlite store ready");
        Ok(store)
    }

    /// Wraps an existing pool, applying any pending migrations.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| StoreError::Backend(format!("migration failed: {err}")))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_in_memory_url(url: &str) -> bool {
    url.contains(":memory:")
        || url
            .split_once('?')
            .is_some_and(|(_, query)| query.split('&').any(|pair| pair == "mode=memory"))
}

/// Translates sqlx failures, naming the violated constraint where SQLite
/// reports one.
fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            if let Some(constraint) = constraint_from_message(db.message()) {
                return StoreError::UniqueViolation(constraint);
            }
        }
        if db.is_foreign_key_violation() {
            return StoreError::ForeignKeyViolation(db.message().to_owned());
        }
    }
    StoreError::Backend(err.to_string())
}

/// Parses "UNIQUE constraint failed: users.username" and friends.
fn constraint_from_message(message: &str) -> Option<Constraint> {
    let columns = message.split("failed:").nth(1)?.trim();
    let first = columns.split(',').next()?.trim();
    let (table, column) = first.split_once('.')?;

    match (table, column) {
        ("users", "id") => Some(Constraint::UserId),
        ("users", "username") => Some(Constraint::Username),
        ("photos", "id") => Some(Constraint::PhotoId),
        ("comments", "id") => Some(Constraint::CommentId),
        ("follows", _) => Some(Constraint::Follow),
        ("bans", _) => Some(Constraint::Ban),
        ("likes", _) => Some(Constraint::Like),
        _ => None,
    }
}

fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Backend(format!("timestamp out of range: {micros}")))
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::from(row.id),
            username: row.username,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BanRow {
    banner_id: String,
    banned_id: String,
    created_at: i64,
}

impl TryFrom<BanRow> for BanEdge {
    type Error = StoreError;

    fn try_from(row: BanRow) -> Result<Self, Self::Error> {
        Ok(BanEdge {
            banner: UserId::from(row.banner_id),
            banned: UserId::from(row.banned_id),
            created_at: from_micros(row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PhotoRow {
    id: String,
    owner_id: String,
    image: Vec<u8>,
    created_at: i64,
}

impl TryFrom<PhotoRow> for Photo {
    type Error = StoreError;

    fn try_from(row: PhotoRow) -> Result<Self, Self::Error> {
        Ok(Photo {
            id: PhotoId::from(row.id),
            owner: UserId::from(row.owner_id),
            image: Bytes::from(row.image),
            created_at: from_micros(row.created_at)?,
        })
    }
}

/// A photo row with its rowid, for merging results across statements.
#[derive(sqlx::FromRow)]
struct SequencedPhotoRow {
    #[sqlx(flatten)]
    photo: PhotoRow,
    seq: i64,
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: String,
    user_id: String,
    photo_id: String,
    body: String,
    created_at: i64,
}

impl TryFrom<CommentRow> for Comment {
    type Error = StoreError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        Ok(Comment {
            id: CommentId::from(row.id),
            author: UserId::from(row.user_id),
            photo: PhotoId::from(row.photo_id),
            body: row.body,
            created_at: from_micros(row.created_at)?,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

const PHOTO_COLUMNS: &str = "SELECT id, owner_id, image, created_at FROM photos";

/// Owners bound per `IN (...)` list; SQLite caps variables per statement.
const OWNER_CHUNK: usize = 500;

#[async_trait]
impl UserRepository for SqliteStore {
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO users (id, username) VALUES (?, ?)")
            .bind(user.id.as_str())
            .bind(&user.username)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn user_id_exists(&self, id: &UserId) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, username FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, username FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(User::from))
    }

    async fn update_username(&self, id: &UserId, username: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET username = ? WHERE id = ?")
            .bind(username)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT id, username FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}

#[async_trait]
impl GraphRepository for SqliteStore {
    async fn insert_follow(&self, edge: &FollowEdge) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO follows (follower_id, followed_id) VALUES (?, ?)")
            .bind(edge.follower.as_str())
            .bind(edge.followed.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn delete_follow(&self, follower: &UserId, followed: &UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followed_id = ?")
            .bind(follower.as_str())
            .bind(followed.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn follow_exists(&self, follower: &UserId, followed: &UserId) -> Result<bool, StoreError> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ? AND followed_id = ?)",
        )
        .bind(follower.as_str())
        .bind(followed.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn followers_of(&self, user: &UserId) -> Result<Vec<UserId>, StoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT follower_id FROM follows WHERE followed_id = ?")
                .bind(user.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(ids.into_iter().map(UserId::from).collect())
    }

    async fn following_of(&self, user: &UserId) -> Result<Vec<UserId>, StoreError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT followed_id FROM follows WHERE follower_id = ?")
                .bind(user.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)?;
        Ok(ids.into_iter().map(UserId::from).collect())
    }

    async fn insert_ban(&self, edge: &BanEdge) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO bans (banner_id, banned_id, created_at) VALUES (?, ?, ?)")
            .bind(edge.banner.as_str())
            .bind(edge.banned.as_str())
            .bind(to_micros(edge.created_at))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn delete_ban(&self, banner: &UserId, banned: &UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM bans WHERE banner_id = ? AND banned_id = ?")
            .bind(banner.as_str())
            .bind(banned.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn ban_exists(&self, banner: &UserId, banned: &UserId) -> Result<bool, StoreError> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM bans WHERE banner_id = ? AND banned_id = ?)",
        )
        .bind(banner.as_str())
        .bind(banned.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn list_bans(&self) -> Result<Vec<BanEdge>, StoreError> {
        let rows = sqlx::query_as::<_, BanRow>(
            "SELECT banner_id, banned_id, created_at FROM bans ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        convert_all(rows)
    }
}

#[async_trait]
impl ContentRepository for SqliteStore {
    async fn insert_photo(&self, photo: &Photo) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO photos (id, owner_id, image, created_at) VALUES (?, ?, ?, ?)")
            .bind(photo.id.as_str())
            .bind(photo.owner.as_str())
            .bind(photo.image.as_ref())
            .bind(to_micros(photo.created_at))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn photo_id_exists(&self, id: &PhotoId) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM photos WHERE id = ?)")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn find_photo(&self, id: &PhotoId) -> Result<Option<Photo>, StoreError> {
        let row = sqlx::query_as::<_, PhotoRow>(&format!("{PHOTO_COLUMNS} WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(Photo::try_from).transpose()
    }

    async fn list_photos(&self) -> Result<Vec<Photo>, StoreError> {
        let rows = sqlx::query_as::<_, PhotoRow>(&format!(
            "{PHOTO_COLUMNS} ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        convert_all(rows)
    }

    /// Binds owners `OWNER_CHUNK` at a time to stay under SQLite's bound
    /// variable limit, then merges the chunks back into one newest-first list.
    async fn photos_by_owners(&self, owners: &[UserId]) -> Result<Vec<Photo>, StoreError> {
        let mut rows: Vec<SequencedPhotoRow> = Vec::new();
        for chunk in owners.chunks(OWNER_CHUNK) {
            let mut query = QueryBuilder::<Sqlite>::new(
                "SELECT id, owner_id, image, created_at, rowid AS seq FROM photos WHERE owner_id IN (",
            );
            let mut separated = query.separated(", ");
            for owner in chunk {
                separated.push_bind(owner.as_str());
            }
            separated.push_unseparated(")");

            let mut batch = query
                .build_query_as::<SequencedPhotoRow>()
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)?;
            rows.append(&mut batch);
        }

        rows.sort_by(|a, b| {
            b.photo
                .created_at
                .cmp(&a.photo.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        rows.into_iter().map(|row| Photo::try_from(row.photo)).collect()
    }

    /// Deletes comments, likes and the photo inside one transaction.
    ///
    /// # Developer Note
    /// Returning early through `?` drops `tx` uncommitted, which rolls back
    /// whatever the earlier statements removed.
    async fn delete_photo_cascade(&self, id: &PhotoId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        // 1. Comments
        let comments = sqlx::query("DELETE FROM comments WHERE photo_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .rows_affected();

        // 2. Likes
        let likes = sqlx::query("DELETE FROM likes WHERE photo_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .rows_affected();

        // 3. Photo
        let photos = sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .rows_affected();

        if photos == 0 {
            tx.rollback().await.map_err(map_sqlx)?;
            return Ok(false);
        }

        tx.commit().await.map_err(map_sqlx)?;
        debug!(photo_id = %id, comments, likes, "cascade committed");
        Ok(true)
    }

    async fn insert_like(&self, like: &Like) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO likes (user_id, photo_id, created_at) VALUES (?, ?, ?)")
            .bind(like.user.as_str())
            .bind(like.photo.as_str())
            .bind(to_micros(like.created_at))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn delete_like(&self, user: &UserId, photo: &PhotoId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM likes WHERE user_id = ? AND photo_id = ?")
            .bind(user.as_str())
            .bind(photo.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn like_exists(&self, user: &UserId, photo: &PhotoId) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = ? AND photo_id = ?)")
            .bind(user.as_str())
            .bind(photo.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn count_likes(&self, photo: &PhotoId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE photo_id = ?")
            .bind(photo.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(count.max(0) as u64)
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO comments (id, user_id, photo_id, body, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(comment.id.as_str())
        .bind(comment.author.as_str())
        .bind(comment.photo.as_str())
        .bind(&comment.body)
        .bind(to_micros(comment.created_at))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn comment_id_exists(&self, id: &CommentId) -> Result<bool, StoreError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM comments WHERE id = ?)")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }

    async fn delete_comment(&self, id: &CommentId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn comments_of(&self, photo: &PhotoId) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT id, user_id, photo_id, body, created_at FROM comments \
             WHERE photo_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(photo.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        convert_all(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:", 1).await.unwrap()
    }

    fn user(id: &str, name: &str) -> User {
        User {
            id: UserId::from(id),
            username: name.into(),
        }
    }

    #[test]
    fn test_constraint_parsing() {
        assert_eq!(
            constraint_from_message("UNIQUE constraint failed: users.username"),
            Some(Constraint::Username)
        );
        assert_eq!(
            constraint_from_message("UNIQUE constraint failed: users.id"),
            Some(Constraint::UserId)
        );
        assert_eq!(
            constraint_from_message("UNIQUE constraint failed: likes.user_id, likes.photo_id"),
            Some(Constraint::Like)
        );
        assert_eq!(constraint_from_message("something else"), None);
    }

    #[tokio::test]
    async fn test_unique_violations_name_their_constraint() {
        let store = store().await;
        store.insert_user(&user("u1", "alice")).await.unwrap();

        assert_eq!(
            store.insert_user(&user("u2", "alice")).await.unwrap_err(),
            StoreError::UniqueViolation(Constraint::Username)
        );
        assert_eq!(
            store.insert_user(&user("u1", "bob")).await.unwrap_err(),
            StoreError::UniqueViolation(Constraint::UserId)
        );
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let store = store().await;
        let err = store
            .insert_photo(&Photo {
                id: PhotoId::from("p1"),
                owner: UserId::from("ghost"),
                image: Bytes::from_static(b"img"),
                created_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[tokio::test]
    async fn test_timestamps_round_trip_at_microsecond_precision() {
        let store = store().await;
        store.insert_user(&user("u1", "alice")).await.unwrap();
        let at = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let photo = Photo {
            id: PhotoId::from("p1"),
            owner: UserId::from("u1"),
            image: Bytes::from_static(b"\x89PNG"),
            created_at: at,
        };
        store.insert_photo(&photo).await.unwrap();

        let loaded = store.find_photo(&photo.id).await.unwrap().unwrap();
        assert_eq!(loaded, photo);
    }

    #[test]
    fn test_in_memory_url_forms() {
        assert!(is_in_memory_url("sqlite::memory:"));
        assert!(is_in_memory_url("sqlite://photogram?mode=memory"));
        assert!(is_in_memory_url("sqlite://photogram?cache=shared&mode=memory"));
        assert!(!is_in_memory_url("sqlite://photogram.db"));
        assert!(!is_in_memory_url("sqlite://photogram.db?mode=rwc"));
    }

    #[tokio::test]
    async fn test_photos_by_owners_handles_follow_sets_beyond_the_variable_limit() {
        let store = store().await;
        store.insert_user(&user("first", "first")).await.unwrap();
        store.insert_user(&user("last", "last")).await.unwrap();
        let photo = |id: &str, owner: &str, secs: i64| Photo {
            id: PhotoId::from(id),
            owner: UserId::from(owner),
            image: Bytes::from_static(b"img"),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        };
        store.insert_photo(&photo("p1", "first", 10)).await.unwrap();
        store.insert_photo(&photo("p2", "last", 20)).await.unwrap();
        store.insert_photo(&photo("p3", "first", 30)).await.unwrap();
        store.insert_photo(&photo("p4", "last", 30)).await.unwrap();

        // The two real owners land in the first and the last chunk
        let mut owners = vec![UserId::from("first")];
        owners.extend((0..40_000).map(|i| UserId::from(format!("nobody{i}"))));
        owners.push(UserId::from("last"));

        let ids: Vec<_> = store
            .photos_by_owners(&owners)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id.into_inner())
            .collect();
        assert_eq!(ids, ["p4", "p3", "p2", "p1"]);
    }
}
