//! # Handlers
//!
//! Each handler resolves path and body values, calls one service operation
//! and turns the typed result into JSON. No business rules live here beyond
//! ownership checks tied to the caller.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use domains::{CommentId, PhotoId};
use tracing::{info, warn};

use crate::{
    caller::Caller,
    dto::{
        BanDto, CommentBody, CommentDto, CreatedCommentDto, CreatedPhotoDto, LikedDto, PhotoDetailDto,
        PhotoSummaryDto, ProfileDto, UserDto, UsernameBody,
    },
    error::{ApiError, ApiResult},
    AppState,
};

/// Multipart field carrying the upload.
pub const IMAGE_FIELD: &str = "image";

pub async fn liveness(State(state): State<AppState>) -> StatusCode {
    match state.services.identity.ping().await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            warn!(error = %err, "liveness probe failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// 201 when the username was new, 200 when it already existed.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<UsernameBody>,
) -> ApiResult<impl IntoResponse> {
    let outcome = state.services.identity.login_or_register(&body.username).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(UserDto::from(outcome.user))))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<UsernameBody>,
) -> ApiResult<impl IntoResponse> {
    let user = state.services.identity.register(&body.username).await?;
    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(UserDto::from(user))))
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserDto>>> {
    let users = state.services.identity.list_users().await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<ProfileDto>> {
    let profile = state.services.profiles.profile(&username).await?;
    Ok(Json(profile.into()))
}

pub async fn rename(
    State(state): State<AppState>,
    Caller(me): Caller,
    Path(username): Path<String>,
    Json(body): Json<UsernameBody>,
) -> ApiResult<Json<UserDto>> {
    if me.username != username {
        return Err(ApiError::Forbidden("you can only rename yourself".into()));
    }
    state.services.identity.rename(&me.id, &body.username).await?;
    let user = state.services.identity.lookup_by_id(&me.id).await?;
    Ok(Json(user.into()))
}

pub async fn followers(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<Vec<UserDto>>> {
    let users = state.services.profiles.followers_of_username(&username).await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

pub async fn user_photos(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<Vec<PhotoSummaryDto>>> {
    let owner = state.services.identity.lookup_by_username(&username).await?;
    let photos = state.services.content.photos_of(&owner.id).await?;
    Ok(Json(photos.into_iter().map(PhotoSummaryDto::from).collect()))
}

pub async fn follow(
    State(state): State<AppState>,
    Caller(me): Caller,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    let target = state.services.identity.lookup_by_username(&username).await?;
    state.services.graph.follow(&me.id, &target.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unfollow(
    State(state): State<AppState>,
    Caller(me): Caller,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    let target = state.services.identity.lookup_by_username(&username).await?;
    state.services.graph.unfollow(&me.id, &target.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn ban(
    State(state): State<AppState>,
    Caller(me): Caller,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    let target = state.services.identity.lookup_by_username(&username).await?;
    state.services.graph.ban(&me.id, &target.id).await?;
    info!(banner = %me.id, banned = %target.id, "ban recorded");
    Ok(StatusCode::CREATED)
}

pub async fn unban(
    State(state): State<AppState>,
    Caller(me): Caller,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    let target = state.services.identity.lookup_by_username(&username).await?;
    state.services.graph.unban(&me.id, &target.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_bans(State(state): State<AppState>) -> ApiResult<Json<Vec<BanDto>>> {
    let bans = state.services.graph.list_bans().await?;
    Ok(Json(bans.into_iter().map(BanDto::from).collect()))
}

pub async fn upload_photo(
    State(state): State<AppState>,
    Caller(me): Caller,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.body_text()))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::BadRequest(err.body_text()))?;
            image = Some(bytes);
            break;
        }
    }
    let image = image.ok_or_else(|| ApiError::BadRequest(format!("missing `{IMAGE_FIELD}` field")))?;

    let photo = state.services.content.upload_photo(&me.id, image).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedPhotoDto {
            photo_id: photo.id.into_inner(),
        }),
    ))
}

pub async fn list_photos(State(state): State<AppState>) -> ApiResult<Json<Vec<PhotoSummaryDto>>> {
    let photos = state.services.content.list_all_photos().await?;
    Ok(Json(photos.into_iter().map(PhotoSummaryDto::from).collect()))
}

pub async fn get_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<String>,
) -> ApiResult<Json<PhotoDetailDto>> {
    let detail = state.services.content.get_photo(&PhotoId::from(photo_id)).await?;
    Ok(Json(detail.into()))
}

pub async fn delete_photo(
    State(state): State<AppState>,
    Caller(me): Caller,
    Path(photo_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = PhotoId::from(photo_id);
    let detail = state.services.content.get_photo(&id).await?;
    if detail.photo.owner != me.id {
        return Err(ApiError::Forbidden("only the owner can delete a photo".into()));
    }
    state.services.content.delete_photo(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like(
    State(state): State<AppState>,
    Caller(me): Caller,
    Path(photo_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services.content.like(&me.id, &PhotoId::from(photo_id)).await?;
    Ok(StatusCode::CREATED)
}

pub async fn unlike(
    State(state): State<AppState>,
    Caller(me): Caller,
    Path(photo_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services.content.unlike(&me.id, &PhotoId::from(photo_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn like_status(
    State(state): State<AppState>,
    Caller(me): Caller,
    Path(photo_id): Path<String>,
) -> ApiResult<Json<LikedDto>> {
    let liked = state.services.content.is_liked(&me.id, &PhotoId::from(photo_id)).await?;
    Ok(Json(LikedDto { liked }))
}

pub async fn comments(
    State(state): State<AppState>,
    Path(photo_id): Path<String>,
) -> ApiResult<Json<Vec<CommentDto>>> {
    let comments = state.services.content.comments_of(&PhotoId::from(photo_id)).await?;
    Ok(Json(comments.into_iter().map(CommentDto::from).collect()))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Caller(me): Caller,
    Path(photo_id): Path<String>,
    Json(body): Json<CommentBody>,
) -> ApiResult<impl IntoResponse> {
    if body.content.trim().is_empty() {
        return Err(ApiError::BadRequest("comment content must not be blank".into()));
    }
    let comment = state
        .services
        .content
        .add_comment(&me.id, &PhotoId::from(photo_id), &body.content)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedCommentDto {
            comment_id: comment.id.into_inner(),
        }),
    ))
}

pub async fn remove_comment(
    State(state): State<AppState>,
    _caller: Caller,
    Path(comment_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.services.content.remove_comment(&CommentId::from(comment_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stream(
    State(state): State<AppState>,
    Caller(me): Caller,
) -> ApiResult<Json<Vec<PhotoSummaryDto>>> {
    let photos = state.services.feed.stream_photos_for(&me.id).await?;
    Ok(Json(photos.into_iter().map(PhotoSummaryDto::from).collect()))
}
