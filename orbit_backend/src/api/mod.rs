pub mod auth;

use crate::accounts::{AccountService, LoginView, RegisteredUser, SettingsView};
use crate::config::OrbitConfig;
use crate::database::models::SettingsUpdate;
use crate::database::Database;
use crate::friends::{
    BlockedView, FriendError, FriendService, FriendView, IncomingRequestView, SentRequestView,
};
use crate::location::{LocationService, LocationView, UpdateLocationInput};
use crate::nearby::{NearbyResult, NearbyService};
use crate::visibility::QueryScope;
use anyhow::Result;
use self::auth::CurrentUser;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

const MIN_RADIUS_METERS: i64 = 100;
const MAX_RADIUS_METERS: i64 = 5000;
const MAX_DISPLAY_NAME_LEN: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub config: OrbitConfig,
    pub database: Database,
}

/// Tries to bind to the given port, or finds the next available port
async fn find_available_port(start_port: u16) -> Result<(TcpListener, u16)> {
    const MAX_PORT_ATTEMPTS: u16 = 100;

    for offset in 0..MAX_PORT_ATTEMPTS {
        let port = start_port + offset;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok((listener, port)),
            Err(e) => {
                if offset == 0 {
                    tracing::debug!(port, error = %e, "Port in use, trying next port");
                }
                continue;
            }
        }
    }

    anyhow::bail!(
        "Could not find available port in range {}-{}",
        start_port,
        start_port + MAX_PORT_ATTEMPTS - 1
    )
}

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler));

    let protected = Router::new()
        .route("/api/settings", get(get_settings_handler))
        .route("/api/settings/update", post(update_settings_handler))
        .route("/api/location/update", post(update_location_handler))
        .route("/api/location/nearby", get(nearby_handler))
        .route("/api/friends/list", get(list_friends_handler))
        .route("/api/friends/invite", post(invite_friend_handler))
        .route("/api/friends/requests", get(list_requests_handler))
        .route("/api/friends/accept", post(accept_request_handler))
        .route("/api/friends/reject", post(reject_request_handler))
        .route("/api/friends/unfriend", post(unfriend_handler))
        .route("/api/friends/block", post(block_handler))
        .route("/api/friends/unblock", post(unblock_handler))
        .route("/api/friends/blocked", get(list_blocked_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_device_secret,
        ));

    public
        .merge(protected)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn serve_http(config: OrbitConfig, database: Database) -> Result<()> {
    let state = AppState {
        config: config.clone(),
        database,
    };
    let router = build_router(state);

    let (listener, actual_port) = find_available_port(config.api_port).await?;
    let addr = SocketAddr::from(([0, 0, 0, 0], actual_port));

    if actual_port != config.api_port {
        tracing::warn!(
            requested_port = config.api_port,
            actual_port = actual_port,
            "Configured port was in use, bound to next available port"
        );
    }

    tracing::info!(?addr, "HTTP server listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        api_port: state.config.api_port,
    })
}

async fn register_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RegisteredUser>), ApiError> {
    let service = AccountService::new(state.database.clone(), state.config.proximity);
    let registered = service.register()?;
    Ok((StatusCode::CREATED, Json(registered)))
}

async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<LoginView> {
    let service = AccountService::new(state.database.clone(), state.config.proximity);
    match service.login(payload.device_secret.trim())? {
        Some(view) => Ok(Json(view)),
        None => Err(ApiError::Unauthorized("invalid device secret".into())),
    }
}

async fn get_settings_handler(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<SettingsView> {
    Json(SettingsView::from_record(&user))
}

async fn update_settings_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<UpdateSettingsRequest>,
) -> ApiResult<SettingsView> {
    let mut update = SettingsUpdate::default();

    if let Some(raw) = payload.display_name {
        let trimmed = raw.trim().to_string();
        if trimmed.len() > MAX_DISPLAY_NAME_LEN {
            return Err(ApiError::BadRequest(format!(
                "displayName must be at most {MAX_DISPLAY_NAME_LEN} characters"
            )));
        }
        // Empty string clears the name.
        update.display_name = Some(if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        });
    }
    if let Some(raw) = payload.mode {
        let mode = raw
            .parse()
            .map_err(|err: crate::database::models::ParseVisibilityModeError| {
                ApiError::BadRequest(err.to_string())
            })?;
        update.mode = Some(mode);
    }
    if let Some(radius) = payload.radius_meters {
        if !(MIN_RADIUS_METERS..=MAX_RADIUS_METERS).contains(&radius) {
            return Err(ApiError::BadRequest(format!(
                "radiusMeters must be between {MIN_RADIUS_METERS} and {MAX_RADIUS_METERS}"
            )));
        }
        update.radius_meters = Some(radius);
    }
    if let Some(show) = payload.show_friends_on_map {
        update.show_friends_on_map = Some(show);
    }

    if update.is_empty() {
        return Err(ApiError::BadRequest("no valid fields to update".into()));
    }

    let service = AccountService::new(state.database.clone(), state.config.proximity);
    let view = service.update_settings(user.id, update)?;
    Ok(Json(view))
}

async fn update_location_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<UpdateLocationInput>,
) -> ApiResult<LocationView> {
    let service = LocationService::new(state.database.clone(), state.config.proximity);
    match service.update(user.id, payload) {
        Ok(view) => Ok(Json(view)),
        Err(err) if err.to_string().contains("must be between") => {
            Err(ApiError::BadRequest(err.to_string()))
        }
        Err(err) => Err(ApiError::Internal(err)),
    }
}

async fn nearby_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<NearbyParams>,
) -> ApiResult<NearbyResult> {
    let scope: QueryScope = params
        .scope
        .as_deref()
        .unwrap_or("friends")
        .parse()
        .map_err(|err: crate::visibility::ParseScopeError| ApiError::BadRequest(err.to_string()))?;

    let service = NearbyService::new(state.database.clone(), state.config.proximity);
    let result = service.get_nearby(&user, scope)?;
    Ok(Json(result))
}

async fn list_friends_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Vec<FriendView>> {
    let service = FriendService::new(state.database.clone());
    let friends = service.list_friends(user.id)?;
    Ok(Json(friends))
}

async fn invite_friend_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<InviteRequest>,
) -> Result<(StatusCode, Json<SentRequestView>), ApiError> {
    let service = FriendService::new(state.database.clone());
    let sent = service.send_request(&user, &payload.friend_code)?;
    Ok((StatusCode::CREATED, Json(sent)))
}

async fn list_requests_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Vec<IncomingRequestView>> {
    let service = FriendService::new(state.database.clone());
    let requests = service.incoming_requests(user.id)?;
    Ok(Json(requests))
}

async fn accept_request_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<RequestActionRequest>,
) -> ApiResult<FriendView> {
    let service = FriendService::new(state.database.clone());
    let friend = service.accept(&user, payload.request_id)?;
    Ok(Json(friend))
}

async fn reject_request_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<RequestActionRequest>,
) -> Result<StatusCode, ApiError> {
    let service = FriendService::new(state.database.clone());
    service.reject(&user, payload.request_id)?;
    Ok(StatusCode::OK)
}

async fn unfriend_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<FriendActionRequest>,
) -> Result<StatusCode, ApiError> {
    let service = FriendService::new(state.database.clone());
    service.unfriend(user.id, payload.friend_id)?;
    Ok(StatusCode::OK)
}

async fn block_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<BlockActionRequest>,
) -> Result<StatusCode, ApiError> {
    let service = FriendService::new(state.database.clone());
    service.block(user.id, payload.user_id)?;
    Ok(StatusCode::OK)
}

async fn unblock_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<BlockActionRequest>,
) -> Result<StatusCode, ApiError> {
    let service = FriendService::new(state.database.clone());
    service.unblock(user.id, payload.user_id)?;
    Ok(StatusCode::OK)
}

async fn list_blocked_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Vec<BlockedView>> {
    let service = FriendService::new(state.database.clone());
    let blocked = service.list_blocked(user.id)?;
    Ok(Json(blocked))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    api_port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    device_secret: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSettingsRequest {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    radius_meters: Option<i64>,
    #[serde(default)]
    show_friends_on_map: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NearbyParams {
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InviteRequest {
    friend_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestActionRequest {
    request_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FriendActionRequest {
    friend_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockActionRequest {
    user_id: i64,
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn into_response_parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse { message: msg }),
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorResponse { message: msg })
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse { message: msg }),
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "internal server error".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.into_response_parts();
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<FriendError> for ApiError {
    fn from(err: FriendError) -> Self {
        match err {
            FriendError::CodeNotFound
            | FriendError::RequestNotFound
            | FriendError::NotFriends
            | FriendError::UserNotFound => ApiError::NotFound(err.to_string()),
            FriendError::Internal(inner) => ApiError::Internal(inner),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}
