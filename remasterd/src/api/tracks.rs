//! Track catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::tracks::{self, NewTrack, Track};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Request body for POST /tracks
#[derive(Debug, Deserialize)]
pub struct CreateTrackRequest {
    pub title: String,
    pub file_path: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub artwork_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TracksResponse {
    pub tracks: Vec<Track>,
}

/// POST /tracks
///
/// Register a local audio file as a track. The file must exist; the
/// catalog never owns the audio itself.
pub async fn create_track(
    State(state): State<AppState>,
    Json(request): Json<CreateTrackRequest>,
) -> ApiResult<(StatusCode, Json<Track>)> {
    if request.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    if request.file_path.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "file_path must not be empty".to_string(),
        ));
    }

    let metadata = tokio::fs::metadata(&request.file_path).await.map_err(|_| {
        ApiError::BadRequest(format!("file_path does not exist: {}", request.file_path))
    })?;
    if !metadata.is_file() {
        return Err(ApiError::BadRequest(format!(
            "file_path is not a file: {}",
            request.file_path
        )));
    }

    let track = tracks::insert_track(
        &state.db,
        NewTrack {
            title: request.title,
            file_path: request.file_path,
            artist: request.artist,
            album: request.album,
            year: request.year,
            isrc: request.isrc,
            comment: request.comment,
            artwork_path: request.artwork_path,
        },
    )
    .await?;

    tracing::info!(track_id = %track.guid, title = %track.title, "Registered track");
    Ok((StatusCode::CREATED, Json(track)))
}

/// GET /tracks
pub async fn list_tracks(State(state): State<AppState>) -> ApiResult<Json<TracksResponse>> {
    let tracks = tracks::list_tracks(&state.db).await?;
    Ok(Json(TracksResponse { tracks }))
}

/// GET /tracks/:track_id
pub async fn get_track(
    State(state): State<AppState>,
    Path(track_id): Path<Uuid>,
) -> ApiResult<Json<Track>> {
    let track = tracks::get_track(&state.db, track_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("track {} not found", track_id)))?;
    Ok(Json(track))
}

/// DELETE /tracks/:track_id
///
/// Removes the catalog entry and all of its mastering meta. The audio
/// file on disk is left alone.
pub async fn delete_track(
    State(state): State<AppState>,
    Path(track_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let deleted = tracks::delete_track(&state.db, track_id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("track {} not found", track_id)));
    }

    state.store.clear_entity(&track_id.to_string()).await?;

    tracing::info!(%track_id, "Deleted track");
    Ok(StatusCode::NO_CONTENT)
}

/// Build track catalog routes
pub fn track_routes() -> Router<AppState> {
    Router::new()
        .route("/tracks", post(create_track))
        .route("/tracks", get(list_tracks))
        .route("/tracks/:track_id", get(get_track))
        .route("/tracks/:track_id", delete(delete_track))
}
