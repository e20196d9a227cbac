//! Sound-region endpoint
//!
//! Decodes a track's source WAV and reports the audible spans, for
//! trimming silence before submission or sanity-checking a master.

use std::path::PathBuf;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::tracks;
use crate::error::{ApiError, ApiResult};
use crate::services::segmenter::{self, SegmentError, Segmenter, SoundRegion};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SegmentQuery {
    pub threshold_db: Option<f32>,
    pub min_silence_secs: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct SegmentsResponse {
    pub track_id: Uuid,
    pub duration_seconds: f32,
    pub regions: Vec<SoundRegion>,
}

/// GET /tracks/:track_id/segments
///
/// Query parameters override the configured threshold and minimum
/// silence duration. WAV sources only.
pub async fn track_segments(
    State(state): State<AppState>,
    Path(track_id): Path<Uuid>,
    Query(query): Query<SegmentQuery>,
) -> ApiResult<Json<SegmentsResponse>> {
    let track = tracks::get_track(&state.db, track_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("track {} not found", track_id)))?;

    let path = PathBuf::from(&track.file_path);
    if tokio::fs::metadata(&path).await.is_err() {
        return Err(ApiError::NotFound(format!(
            "source file missing: {}",
            track.file_path
        )));
    }

    let defaults = &state.config.segmenter;
    let threshold_db = query.threshold_db.unwrap_or(defaults.threshold_db as f32);
    let min_silence_secs = query
        .min_silence_secs
        .unwrap_or(defaults.min_silence_secs as f32);

    let scanner = Segmenter::new()
        .with_threshold_db(threshold_db)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
        .with_min_silence_secs(min_silence_secs)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    // Decode and scan on the blocking pool.
    let (regions, duration_seconds) =
        tokio::task::spawn_blocking(move || -> Result<_, SegmentError> {
            let (samples, sample_rate) = segmenter::load_wav_mono(&path)?;
            let duration_seconds = samples.len() as f32 / sample_rate as f32;
            let regions = scanner.scan(&samples, sample_rate)?;
            Ok((regions, duration_seconds))
        })
        .await
        .map_err(|e| ApiError::Internal(format!("segment task failed: {}", e)))?
        .map_err(|e| match e {
            SegmentError::Decode(_) => {
                ApiError::UnsupportedMedia("only WAV sources can be segmented".to_string())
            }
            other => ApiError::BadRequest(other.to_string()),
        })?;

    tracing::debug!(%track_id, regions = regions.len(), "Segmented track");

    Ok(Json(SegmentsResponse {
        track_id,
        duration_seconds,
        regions,
    }))
}

/// Build segment routes
pub fn segment_routes() -> Router<AppState> {
    Router::new().route("/tracks/:track_id/segments", get(track_segments))
}
