use std::sync::Arc;

use api_adapters::{router, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use domains::SystemClock;
use serde_json::{json, Value};
use services::{IdAllocator, Services};
use storage_adapters::MemoryStore;
use tower::ServiceExt;

const LIMIT: usize = 1024 * 1024;
const BOUNDARY: &str = "photogram-test-boundary";

fn app() -> Router {
    let services = Services::new(
        Arc::new(MemoryStore::new()),
        IdAllocator::random(10, 16),
        Arc::new(SystemClock),
    );
    router(AppState::new(Arc::new(services)), LIMIT)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn upload_request(token: &str, image: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"image\"; filename=\"a.png\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(image);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/photos")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn login(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        json_request("POST", "/session", None, json!({ "username": username })),
    )
    .await;
    assert!(status == StatusCode::CREATED || status == StatusCode::OK);
    body["userId"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn test_liveness() {
    let app = app();
    let (status, _) = send(&app, empty_request("GET", "/liveness", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_session_creates_then_reuses() {
    let app = app();
    let (first, created) = send(
        &app,
        json_request("POST", "/session", None, json!({ "username": "alice" })),
    )
    .await;
    let (second, again) = send(
        &app,
        json_request("POST", "/session", None, json!({ "username": "alice" })),
    )
    .await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(created["userId"], again["userId"]);
}

#[tokio::test]
async fn test_register_duplicate_is_conflict() {
    let app = app();
    login(&app, "alice").await;
    let (status, body) = send(
        &app,
        json_request("POST", "/users", None, json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_blank_username_is_bad_request() {
    let app = app();
    let (status, _) = send(
        &app,
        json_request("POST", "/session", None, json!({ "username": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_or_unknown_token_is_unauthorized() {
    let app = app();
    let (missing, _) = send(&app, empty_request("GET", "/stream", None)).await;
    let (unknown, _) = send(&app, empty_request("GET", "/stream", Some("nobody"))).await;
    assert_eq!(missing, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rename_only_self() {
    let app = app();
    let alice = login(&app, "alice").await;
    login(&app, "bob").await;

    let (forbidden, _) = send(
        &app,
        json_request("PATCH", "/users/bob", Some(&alice), json!({ "username": "robert" })),
    )
    .await;
    assert_eq!(forbidden, StatusCode::FORBIDDEN);

    let (ok, body) = send(
        &app,
        json_request("PATCH", "/users/alice", Some(&alice), json!({ "username": "alicia" })),
    )
    .await;
    assert_eq!(ok, StatusCode::OK);
    assert_eq!(body["username"], "alicia");
}

#[tokio::test]
async fn test_follow_upload_and_stream() {
    let app = app();
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;

    let (followed, _) = send(&app, empty_request("POST", "/users/bob/follows", Some(&alice))).await;
    assert_eq!(followed, StatusCode::NO_CONTENT);

    let (uploaded, body) = send(&app, upload_request(&bob, b"\x89PNG fake")).await;
    assert_eq!(uploaded, StatusCode::CREATED);
    let photo_id = body["photoId"].as_str().unwrap().to_owned();

    let (status, stream) = send(&app, empty_request("GET", "/stream", Some(&alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stream[0]["photoId"], photo_id.as_str());

    let (_, profile) = send(&app, empty_request("GET", "/users/bob", None)).await;
    assert_eq!(profile["followers"][0], alice.as_str());
    assert_eq!(profile["photos"][0], photo_id.as_str());

    let (_, uploads) = send(&app, empty_request("GET", "/users/bob/photos", None)).await;
    assert_eq!(uploads[0]["ownerId"], bob.as_str());
}

#[tokio::test]
async fn test_ban_hides_stream() {
    let app = app();
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;
    send(&app, empty_request("POST", "/users/bob/follows", Some(&alice))).await;
    send(&app, upload_request(&bob, b"img")).await;

    let (banned, _) = send(&app, empty_request("POST", "/users/bob/bans", Some(&alice))).await;
    assert_eq!(banned, StatusCode::CREATED);
    let (again, _) = send(&app, empty_request("POST", "/users/bob/bans", Some(&alice))).await;
    assert_eq!(again, StatusCode::CONFLICT);

    let (_, stream) = send(&app, empty_request("GET", "/stream", Some(&alice))).await;
    assert_eq!(stream, json!([]));

    let (_, bans) = send(&app, empty_request("GET", "/bans", None)).await;
    assert_eq!(bans[0]["bannerId"], alice.as_str());
    assert_eq!(bans[0]["bannedId"], bob.as_str());
}

#[tokio::test]
async fn test_photo_detail_likes_and_comments() {
    let app = app();
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;
    let (_, created) = send(&app, upload_request(&bob, b"abc")).await;
    let photo_id = created["photoId"].as_str().unwrap().to_owned();

    let likes = format!("/photos/{photo_id}/likes");
    let (liked, _) = send(&app, empty_request("POST", &likes, Some(&alice))).await;
    assert_eq!(liked, StatusCode::CREATED);
    let (duplicate, _) = send(&app, empty_request("POST", &likes, Some(&alice))).await;
    assert_eq!(duplicate, StatusCode::CONFLICT);

    let comments = format!("/photos/{photo_id}/comments");
    let (blank, _) = send(
        &app,
        json_request("POST", &comments, Some(&alice), json!({ "content": "  " })),
    )
    .await;
    assert_eq!(blank, StatusCode::BAD_REQUEST);
    let (commented, _) = send(
        &app,
        json_request("POST", &comments, Some(&alice), json!({ "content": "nice" })),
    )
    .await;
    assert_eq!(commented, StatusCode::CREATED);

    let (status, detail) = send(&app, empty_request("GET", &format!("/photos/{photo_id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["ownerUsername"], "bob");
    assert_eq!(detail["likesCount"], 1);
    assert_eq!(detail["imageData"], "YWJj");
    assert_eq!(detail["comments"][0]["content"], "nice");
}

#[tokio::test]
async fn test_delete_photo_owner_only() {
    let app = app();
    let alice = login(&app, "alice").await;
    let bob = login(&app, "bob").await;
    let (_, created) = send(&app, upload_request(&bob, b"abc")).await;
    let uri = format!("/photos/{}", created["photoId"].as_str().unwrap());

    let (forbidden, _) = send(&app, empty_request("DELETE", &uri, Some(&alice))).await;
    assert_eq!(forbidden, StatusCode::FORBIDDEN);

    let (deleted, _) = send(&app, empty_request("DELETE", &uri, Some(&bob))).await;
    assert_eq!(deleted, StatusCode::NO_CONTENT);

    let (gone, _) = send(&app, empty_request("GET", &uri, None)).await;
    assert_eq!(gone, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_unknown_comment_is_not_found() {
    let app = app();
    let alice = login(&app, "alice").await;
    let (status, _) = send(&app, empty_request("DELETE", "/comments/missing", Some(&alice))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_without_image_field() {
    let app = app();
    let alice = login(&app, "alice").await;
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nx\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/photos")
        .header(header::AUTHORIZATION, format!("Bearer {alice}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
