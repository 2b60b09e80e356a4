use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::SeatMapError;
use crate::icons::IconCache;
use crate::models::{EventId, UserId};
use crate::services::status_feed::catch_up;
use crate::session::driver::{now, SessionHandle};
use crate::session::{PointerEvent, SeatMapSession};
use crate::sync::Notice;
use crate::viewport::Transform;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(open_session))
        .route("/sessions/{id}", delete(close_session))
        .route("/sessions/{id}/pointer", post(pointer))
        .route("/sessions/{id}/frame", get(frame))
        .route("/sessions/{id}/summary", get(summary))
        .route("/sessions/{id}/checkout", post(checkout))
        .route("/sessions/{id}/notices", get(notices))
        .route("/sessions/{id}/clear", post(clear))
        .route("/sessions/{id}/refresh", post(refresh))
}

#[derive(Debug, Deserialize, Validate)]
pub struct OpenSessionRequest {
    pub event_id: EventId,
    pub user_id: UserId,
    #[validate(range(min = 1.0, max = 16384.0))]
    pub width: f64,
    #[validate(range(min = 1.0, max = 16384.0))]
    pub height: f64,
}

#[derive(Debug, Serialize)]
pub struct SessionOpened {
    pub session_id: Uuid,
    pub event_id: EventId,
    pub seat_count: usize,
    pub transform: Transform,
}

#[derive(Debug, Serialize)]
pub struct PointerResponse {
    pub transform: Transform,
    pub notices: Vec<Notice>,
}

async fn session(state: &AppState, id: Uuid) -> Result<SessionHandle, SeatMapError> {
    state.sessions.get(id).await.ok_or(SeatMapError::SessionNotFound(id))
}

pub async fn open_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OpenSessionRequest>,
) -> Response {
    if let Err(e) = request.validate() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response();
    }

    let snapshot = match state.snapshots.fetch(request.event_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => return SeatMapError::from(e).into_response(),
    };
    let feed_cursor = snapshot.feed_cursor;
    let session = match SeatMapSession::open(
        request.user_id,
        snapshot,
        request.width,
        request.height,
        &state.config,
        IconCache::new(),
        now(),
    ) {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    let opened = SessionOpened {
        session_id: session.id(),
        event_id: session.event_id(),
        seat_count: session.map().seat_count(),
        transform: session.viewport().transform(),
    };
    let handle = SessionHandle::new(session, state.locks.clone());
    state.sessions.insert(opened.session_id, opened.event_id, handle.clone()).await;
    // Изменения между снимком и регистрацией сеанса поллер уже мог раздать другим
    catch_up(&state.snapshots, &handle, opened.event_id, feed_cursor).await;

    (StatusCode::CREATED, Json(opened)).into_response()
}

pub async fn pointer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(event): Json<PointerEvent>,
) -> Result<Json<PointerResponse>, SeatMapError> {
    let handle = session(&state, id).await?;
    handle.pointer(event).await;
    let (transform, notices) = handle.with(|s| (s.viewport().transform(), s.drain_notices())).await;
    Ok(Json(PointerResponse { transform, notices }))
}

pub async fn frame(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Response, SeatMapError> {
    let handle = session(&state, id).await?;
    Ok(Json(handle.frame().await).into_response())
}

pub async fn summary(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Response, SeatMapError> {
    let handle = session(&state, id).await?;
    Ok(Json(handle.summary().await).into_response())
}

/// Передача выбора в оплату.
pub async fn checkout(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Response, SeatMapError> {
    let handle = session(&state, id).await?;
    let summary = handle.summary().await;
    if summary.is_empty() {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": "nothing selected" }))).into_response());
    }
    Ok(Json(summary.checkout()).into_response())
}

pub async fn notices(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Response, SeatMapError> {
    let handle = session(&state, id).await?;
    Ok(Json(handle.drain_notices().await).into_response())
}

pub async fn clear(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<StatusCode, SeatMapError> {
    let handle = session(&state, id).await?;
    handle.clear().await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn refresh(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<StatusCode, SeatMapError> {
    let handle = session(&state, id).await?;
    let event_id = handle.with(|s| s.event_id()).await;
    let snapshot = state.snapshots.fetch(event_id).await?;
    let feed_cursor = snapshot.feed_cursor;
    let commands = handle.with(|s| s.refresh(snapshot, now())).await;
    handle.execute(commands).await;
    catch_up(&state.snapshots, &handle, event_id, feed_cursor).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Уход со схемы: отмена захватов в полёте и разблокировка выбранного.
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, SeatMapError> {
    let handle = state.sessions.remove(id).await.ok_or(SeatMapError::SessionNotFound(id))?;
    let released = handle.teardown().await;
    info!("Session {} closed", id);
    Ok(Json(json!({ "released": released })).into_response())
}

impl IntoResponse for SeatMapError {
    fn into_response(self) -> Response {
        let status = match &self {
            SeatMapError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            SeatMapError::Selection(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SeatMapError::Snapshot(crate::error::SnapshotError::Empty(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            SeatMapError::Snapshot(_) => StatusCode::BAD_GATEWAY,
            SeatMapError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
