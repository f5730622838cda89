use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use murmur_shared::constants::{MAX_BODY_LEN, MAX_MOOD_LEN, MAX_REPLY_LEN};
use murmur_shared::moderation::is_text_admissible;
use murmur_shared::rewards::{point_value, PointAction};
use murmur_shared::{AccessKey, PostId, PostStatus, ReplyId, Room};
use murmur_store::{Database, Identity, Post, Reply};

use crate::auth;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub config: Arc<ServerConfig>,
    pub rate_limiter: RateLimiter,
    pub started_at: Instant,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let public = Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info));

    // Everything a client does as an identity goes through the access-key
    // middleware.
    let keyed = Router::new()
        .route("/me", get(me))
        .route("/whispers", post(create_whisper))
        .route("/whispers/match", get(match_whisper))
        .route("/whispers/mine", get(my_whispers))
        .route("/whispers/:id", get(view_whisper).delete(delete_whisper))
        .route("/whispers/:id/replies", post(create_reply))
        .route("/whispers/:id/report", post(report_whisper))
        .route("/replies/:id/report", post(report_reply))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_access_key,
        ));

    let admin = Router::new()
        .route("/admin/status", get(admin_status))
        .route("/admin/reported", get(admin_reported))
        .route("/admin/ban", post(admin_ban))
        .route("/admin/whispers/:id/remove", post(admin_remove_whisper));

    Router::new()
        .merge(public)
        .merge(keyed)
        .merge(admin)
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Client-facing views: identity keys never leave the server.
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct WhisperView {
    id: PostId,
    mood: String,
    body: String,
    room: Room,
    reply_count: i64,
    created_at: DateTime<Utc>,
}

impl From<Post> for WhisperView {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            mood: post.mood,
            body: post.body,
            room: post.room,
            reply_count: post.reply_count,
            created_at: post.created_at,
        }
    }
}

#[derive(Serialize)]
struct OwnWhisperView {
    id: PostId,
    mood: String,
    body: String,
    room: Room,
    status: PostStatus,
    reply_count: i64,
    created_at: DateTime<Utc>,
}

impl From<Post> for OwnWhisperView {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            mood: post.mood,
            body: post.body,
            room: post.room,
            status: post.status,
            reply_count: post.reply_count,
            created_at: post.created_at,
        }
    }
}

#[derive(Serialize)]
struct ReplyView {
    id: ReplyId,
    body: String,
    is_author_reply: bool,
    created_at: DateTime<Utc>,
}

impl From<Reply> for ReplyView {
    fn from(reply: Reply) -> Self {
        Self {
            id: reply.id,
            body: reply.body,
            is_author_reply: reply.is_author_reply,
            created_at: reply.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    rooms: Vec<&'static str>,
    registration_open: bool,
}

#[derive(Serialize)]
struct MeResponse {
    points: i64,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct CreateWhisperRequest {
    mood: String,
    body: String,
    room: Option<String>,
}

#[derive(Serialize)]
struct WhisperCreatedResponse {
    id: PostId,
    room: Room,
    points_awarded: i64,
}

#[derive(Deserialize)]
struct MatchQuery {
    room: Option<String>,
}

#[derive(Serialize)]
struct MatchResponse {
    post: Option<WhisperView>,
}

#[derive(Serialize)]
struct WhisperDetailResponse {
    whisper: WhisperView,
    mine: bool,
    replies: Vec<ReplyView>,
}

#[derive(Deserialize)]
struct CreateReplyRequest {
    body: String,
}

#[derive(Serialize)]
struct ReplyCreatedResponse {
    id: ReplyId,
    points_awarded: i64,
}

#[derive(Serialize)]
struct AdminStatusResponse {
    name: String,
    version: &'static str,
    registration_open: bool,
    uptime_secs: u64,
    identities: i64,
    posts: i64,
    replies: i64,
    hidden_posts: i64,
}

#[derive(Serialize)]
struct AdminWhisperView {
    id: PostId,
    mood: String,
    body: String,
    room: Room,
    author_key: String,
    status: PostStatus,
    report_count: i64,
    reply_count: i64,
    created_at: DateTime<Utc>,
}

impl From<Post> for AdminWhisperView {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            mood: post.mood,
            body: post.body,
            room: post.room,
            author_key: post.author_key.as_str().to_string(),
            status: post.status,
            report_count: post.report_count,
            reply_count: post.reply_count,
            created_at: post.created_at,
        }
    }
}

#[derive(Deserialize)]
struct AdminBanRequest {
    key: String,
}

// ---------------------------------------------------------------------------
// Public handlers
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        rooms: Room::ALL.iter().map(Room::as_str).collect(),
        registration_open: state.config.registration_open,
    })
}

// ---------------------------------------------------------------------------
// Keyed handlers
// ---------------------------------------------------------------------------

async fn me(Extension(identity): Extension<Identity>) -> Json<MeResponse> {
    Json(MeResponse {
        points: identity.points,
        created_at: identity.created_at,
    })
}

async fn create_whisper(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateWhisperRequest>,
) -> Result<Json<WhisperCreatedResponse>, ServerError> {
    let mood = req.mood.trim().to_string();
    let body = req.body.trim().to_string();

    if mood.is_empty() || mood.chars().count() > MAX_MOOD_LEN {
        return Err(ServerError::BadRequest(format!(
            "Mood must be 1..={MAX_MOOD_LEN} characters"
        )));
    }
    if body.is_empty() || body.chars().count() > MAX_BODY_LEN {
        return Err(ServerError::BadRequest(format!(
            "Body must be 1..={MAX_BODY_LEN} characters"
        )));
    }
    if !is_text_admissible(&body) || !is_text_admissible(&mood) {
        return Err(ServerError::BadRequest(
            "Text contains disallowed content".to_string(),
        ));
    }

    // Unknown or missing rooms coerce to the default instead of erroring.
    let room = Room::from_label(req.room.as_deref().unwrap_or(""));

    let points_awarded = point_value(PointAction::PostCreated);

    if identity.banned {
        debug!(key = %identity.key, "shadowing whisper creation for banned identity");
        return Ok(Json(WhisperCreatedResponse {
            id: PostId::new(),
            room,
            points_awarded,
        }));
    }

    let post = Post::new(mood, body, room, identity.key.clone());
    state.db.lock().await.create_post(&post)?;

    info!(id = %post.id, room = %room, "whisper created");

    Ok(Json(WhisperCreatedResponse {
        id: post.id,
        room,
        points_awarded,
    }))
}

async fn match_whisper(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<MatchQuery>,
) -> Result<Json<MatchResponse>, ServerError> {
    let post = {
        let db = state.db.lock().await;
        db.select_post(&identity.key, query.room.as_deref(), &mut rand::thread_rng())?
    };

    // None is "no content right now", a normal outcome.
    Ok(Json(MatchResponse {
        post: post.map(WhisperView::from),
    }))
}

async fn my_whispers(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<OwnWhisperView>>, ServerError> {
    let posts = state.db.lock().await.list_posts_by_author(&identity.key)?;
    Ok(Json(posts.into_iter().map(OwnWhisperView::from).collect()))
}

async fn view_whisper(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<WhisperDetailResponse>, ServerError> {
    let id = PostId(id);
    let db = state.db.lock().await;

    let post = db.get_post(id)?;
    let mine = post.author_key == identity.key;

    // A deleted whisper is gone for everyone; a hidden one stays readable
    // only by its author.
    let visible = match post.status {
        PostStatus::Active => true,
        PostStatus::Hidden => mine,
        PostStatus::Deleted => false,
    };
    if !visible {
        return Err(ServerError::NotFound("record not found".to_string()));
    }

    let replies = db.list_replies_for_post(id)?;

    Ok(Json(WhisperDetailResponse {
        whisper: WhisperView::from(post),
        mine,
        replies: replies.into_iter().map(ReplyView::from).collect(),
    }))
}

async fn create_reply(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateReplyRequest>,
) -> Result<Json<ReplyCreatedResponse>, ServerError> {
    let body = req.body.trim().to_string();

    if body.is_empty() || body.chars().count() > MAX_REPLY_LEN {
        return Err(ServerError::BadRequest(format!(
            "Body must be 1..={MAX_REPLY_LEN} characters"
        )));
    }
    if !is_text_admissible(&body) {
        return Err(ServerError::BadRequest(
            "Text contains disallowed content".to_string(),
        ));
    }

    let points_awarded = point_value(PointAction::ReplyCreated);

    if identity.banned {
        debug!(key = %identity.key, "shadowing reply creation for banned identity");
        return Ok(Json(ReplyCreatedResponse {
            id: ReplyId::new(),
            points_awarded,
        }));
    }

    let reply = state
        .db
        .lock()
        .await
        .create_reply(PostId(id), &identity.key, body)?;

    info!(id = %reply.id, post = %reply.post_id, "reply created");

    Ok(Json(ReplyCreatedResponse {
        id: reply.id,
        points_awarded,
    }))
}

async fn report_whisper(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if identity.banned {
        // Banned identities must not be able to drive the hide threshold.
        debug!(key = %identity.key, "shadowing report for banned identity");
        return Ok(Json(serde_json::json!({ "reported": true })));
    }

    let (count, status) = state.db.lock().await.report_post(PostId(id))?;
    debug!(id = %id, count, status = status.as_str(), "whisper reported");

    Ok(Json(serde_json::json!({ "reported": true })))
}

async fn report_reply(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if identity.banned {
        debug!(key = %identity.key, "shadowing report for banned identity");
        return Ok(Json(serde_json::json!({ "reported": true })));
    }

    let (count, status) = state.db.lock().await.report_reply(ReplyId(id))?;
    debug!(id = %id, count, status = status.as_str(), "reply reported");

    Ok(Json(serde_json::json!({ "reported": true })))
}

async fn delete_whisper(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let id = PostId(id);

    if identity.banned {
        debug!(key = %identity.key, "shadowing deletion for banned identity");
        return Ok(Json(serde_json::json!({ "removed": true })));
    }

    let db = state.db.lock().await;
    let post = db.get_post(id)?;
    if post.author_key != identity.key {
        return Err(ServerError::Forbidden("Not the author".to_string()));
    }

    db.mark_post_deleted(id)?;
    info!(id = %id, "whisper removed by author");

    Ok(Json(serde_json::json!({ "removed": true })))
}

// ---------------------------------------------------------------------------
// Admin handlers
// ---------------------------------------------------------------------------

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API disabled: no ADMIN_TOKEN configured".into(),
        ));
    };

    let supplied = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v))
        .unwrap_or("");

    // Constant-time comparison so the token can't be probed byte by byte.
    use subtle::ConstantTimeEq;
    let matches = supplied.len() == expected.len()
        && supplied.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() == 1;
    if !matches {
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

async fn admin_status(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<AdminStatusResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let stats = state.db.lock().await.stats()?;

    Ok(Json(AdminStatusResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        registration_open: state.config.registration_open,
        uptime_secs: state.started_at.elapsed().as_secs(),
        identities: stats.identities,
        posts: stats.posts,
        replies: stats.replies,
        hidden_posts: stats.hidden_posts,
    }))
}

async fn admin_reported(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminWhisperView>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let posts = state.db.lock().await.list_reported_posts(50)?;
    Ok(Json(posts.into_iter().map(AdminWhisperView::from).collect()))
}

async fn admin_ban(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<AdminBanRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let key = AccessKey::parse(&req.key).map_err(|e| ServerError::BadRequest(e.to_string()))?;

    if !state.db.lock().await.ban_identity(&key)? {
        return Err(ServerError::NotFound("record not found".to_string()));
    }

    info!(key = %key, "identity banned");
    Ok(Json(serde_json::json!({ "banned": true })))
}

async fn admin_remove_whisper(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    if !state.db.lock().await.mark_post_deleted(PostId(id))? {
        return Err(ServerError::NotFound("record not found".to_string()));
    }

    info!(id = %id, "whisper removed by admin");
    Ok(Json(serde_json::json!({ "removed": true })))
}

// ---------------------------------------------------------------------------
// Serving
// ---------------------------------------------------------------------------

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token(token: Option<&str>) -> ServerConfig {
        ServerConfig {
            admin_token: token.map(str::to_string),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn admin_api_disabled_without_token() {
        let headers = HeaderMap::new();
        let config = config_with_token(None);
        assert!(verify_admin_token(&headers, &config).is_err());
    }

    #[test]
    fn admin_token_must_match_exactly() {
        let config = config_with_token(Some("sekrit"));

        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer sekrit".parse().unwrap());
        assert!(verify_admin_token(&headers, &config).is_ok());

        headers.insert("authorization", "Bearer wrong!".parse().unwrap());
        assert!(verify_admin_token(&headers, &config).is_err());

        // Bare token (no Bearer prefix) is accepted too.
        headers.insert("authorization", "sekrit".parse().unwrap());
        assert!(verify_admin_token(&headers, &config).is_ok());
    }
}
