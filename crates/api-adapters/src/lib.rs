//! # api-adapters
//!
//! HTTP transport for Photogram. The core services know nothing about HTTP;
//! this crate owns routing, caller identification and the JSON shapes.

pub mod dto;

#[cfg(feature = "web-axum")]
pub mod caller;
#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;

#[cfg(feature = "web-axum")]
pub use router::{router, AppState};

#[cfg(feature = "web-axum")]
mod router {
    use std::sync::Arc;

    use axum::{
        extract::DefaultBodyLimit,
        routing::{delete, get, post},
        Router,
    };
    use services::Services;

    use crate::{handlers, middleware};

    /// Shared by every handler.
    #[derive(Clone)]
    pub struct AppState {
        pub services: Arc<Services>,
    }

    impl AppState {
        pub fn new(services: Arc<Services>) -> Self {
            Self { services }
        }
    }

    /// Builds the full route table.
    ///
    /// `max_upload_bytes` caps every request body, including multipart uploads.
    pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
        Router::new()
            .route("/liveness", get(handlers::liveness))
            .route("/session", post(handlers::login))
            .route("/users", get(handlers::list_users).post(handlers::register))
            .route(
                "/users/{username}",
                get(handlers::profile).patch(handlers::rename),
            )
            .route("/users/{username}/followers", get(handlers::followers))
            .route("/users/{username}/photos", get(handlers::user_photos))
            .route(
                "/users/{username}/follows",
                post(handlers::follow).delete(handlers::unfollow),
            )
            .route(
                "/users/{username}/bans",
                post(handlers::ban).delete(handlers::unban),
            )
            .route("/bans", get(handlers::list_bans))
            .route(
                "/photos",
                get(handlers::list_photos).post(handlers::upload_photo),
            )
            .route(
                "/photos/{photo_id}",
                get(handlers::get_photo).delete(handlers::delete_photo),
            )
            .route(
                "/photos/{photo_id}/likes",
                get(handlers::like_status)
                    .post(handlers::like)
                    .delete(handlers::unlike),
            )
            .route(
                "/photos/{photo_id}/comments",
                get(handlers::comments).post(handlers::add_comment),
            )
            .route("/comments/{comment_id}", delete(handlers::remove_comment))
            .route("/stream", get(handlers::stream))
            .layer(DefaultBodyLimit::max(max_upload_bytes))
            .layer(middleware::request_tracing())
            .layer(middleware::cors_policy())
            .with_state(state)
    }
}
