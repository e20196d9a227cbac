//! Mastering endpoints
//!
//! Submission queues work for the background worker and returns 202; the
//! refresh endpoint polls the remote service synchronously; the download
//! endpoint resolves a token and proxies the mastered audio stream.

use std::collections::BTreeMap;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use remaster_client::{AudioId, DownloadSource, JobState, OutputFormat, ParameterOverrides};

use crate::db::tracks;
use crate::error::{ApiError, ApiResult};
use crate::services::pipeline::{self, MasteringView, RefreshOutcome};
use crate::services::scheduler::Task;
use crate::AppState;

/// Request body for POST /tracks/:track_id/mastering
///
/// All fields are optional; omitted parameters fall back to the
/// configured defaults. Send `{}` to master with defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubmitMasteringRequest {
    pub force: bool,
    pub target_loudness: Option<f64>,
    pub output_format: Option<String>,
    pub algorithm: Option<String>,
    pub bass_preservation: Option<bool>,
    pub extra: BTreeMap<String, String>,
}

impl SubmitMasteringRequest {
    fn to_overrides(&self) -> ApiResult<ParameterOverrides> {
        let output_format = match &self.output_format {
            Some(raw) => Some(raw.parse::<OutputFormat>()?),
            None => None,
        };
        Ok(ParameterOverrides {
            target_loudness: self.target_loudness,
            output_format,
            algorithm: self.algorithm.clone(),
            bass_preservation: self.bass_preservation,
            extra: self.extra.clone(),
        })
    }
}

/// POST /tracks/:track_id/mastering
///
/// Queue a mastering submission for the track. Returns 202 with the
/// current view; progress is observed via GET or the refresh endpoint.
/// While a submission is pending or processing, another one is rejected
/// with 409 unless `force` is set.
pub async fn submit_mastering(
    State(state): State<AppState>,
    Path(track_id): Path<Uuid>,
    Json(request): Json<SubmitMasteringRequest>,
) -> ApiResult<(StatusCode, Json<MasteringView>)> {
    let track = tracks::get_track(&state.db, track_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("track {} not found", track_id)))?;

    let overrides = request.to_overrides()?;

    let current = pipeline::view(&state, track_id).await?;
    if !request.force
        && matches!(
            current.state,
            Some(JobState::PendingSubmission) | Some(JobState::SubmittedProcessing)
        )
    {
        return Err(ApiError::Conflict(format!(
            "mastering already in flight for track {}",
            track_id
        )));
    }

    state
        .queue
        .enqueue(Task::Submit {
            track_id,
            overrides,
            force: request.force,
        })
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;

    tracing::info!(%track_id, title = %track.title, "Queued mastering submission");

    let view = pipeline::view(&state, track_id).await?;
    Ok((StatusCode::ACCEPTED, Json(view)))
}

/// GET /tracks/:track_id/mastering
pub async fn get_mastering(
    State(state): State<AppState>,
    Path(track_id): Path<Uuid>,
) -> ApiResult<Json<MasteringView>> {
    ensure_track(&state, track_id).await?;
    let view = pipeline::view(&state, track_id).await?;
    Ok(Json(view))
}

/// POST /tracks/:track_id/mastering/refresh
///
/// Poll the remote job now instead of waiting for the scheduler. A
/// failed poll is not an error response; it shows up in the returned
/// view as the error_fetching_status state.
pub async fn refresh_mastering(
    State(state): State<AppState>,
    Path(track_id): Path<Uuid>,
) -> ApiResult<Json<MasteringView>> {
    ensure_track(&state, track_id).await?;

    let outcome = pipeline::refresh(&state, track_id).await?;
    if matches!(outcome, RefreshOutcome::NoJob) {
        return Err(ApiError::Conflict(format!(
            "no mastering job recorded for track {}",
            track_id
        )));
    }

    let view = pipeline::view(&state, track_id).await?;
    Ok(Json(view))
}

/// GET /tracks/:track_id/mastering/download
///
/// Resolve a download token for the mastered audio and stream it through
/// without buffering. Requires a completed job.
pub async fn download_mastered(
    State(state): State<AppState>,
    Path(track_id): Path<Uuid>,
) -> ApiResult<Response> {
    let track = tracks::get_track(&state.db, track_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("track {} not found", track_id)))?;

    let view = pipeline::view(&state, track_id).await?;
    if view.state != Some(JobState::Completed) {
        return Err(ApiError::Conflict(format!(
            "mastering is not completed for track {}",
            track_id
        )));
    }
    let output_audio_id = view.output_audio_id.ok_or_else(|| {
        ApiError::Conflict(format!(
            "no mastered audio recorded for track {}",
            track_id
        ))
    })?;

    let audio = AudioId::new(output_audio_id);
    let token = state.client.download_token(&audio).await?;
    let download = state
        .client
        .open_download(DownloadSource::Token(&token))
        .await?;

    let content_type = download
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .map_err(|e| ApiError::Internal(format!("bad content type from remote: {}", e)))?,
    );
    if let Some(length) = download.content_length() {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    let filename = download_filename(&track.title, &content_type);
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .map_err(|e| ApiError::Internal(format!("bad download filename: {}", e)))?,
    );

    tracing::info!(%track_id, content_type = %content_type, "Streaming mastered audio");

    let body = Body::from_stream(download.into_inner().bytes_stream());
    Ok((headers, body).into_response())
}

async fn ensure_track(state: &AppState, track_id: Uuid) -> ApiResult<()> {
    tracks::get_track(&state.db, track_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("track {} not found", track_id)))?;
    Ok(())
}

fn download_filename(title: &str, content_type: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || " ._-".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim();

    let extension = match content_type {
        ct if ct.contains("mpeg") || ct.contains("mp3") => "mp3",
        ct if ct.contains("wav") => "wav",
        ct if ct.contains("flac") => "flac",
        _ => "audio",
    };

    format!(
        "{} - mastered.{}",
        if stem.is_empty() { "track" } else { stem },
        extension
    )
}

/// Build mastering routes
pub fn mastering_routes() -> Router<AppState> {
    Router::new()
        .route("/tracks/:track_id/mastering", post(submit_mastering))
        .route("/tracks/:track_id/mastering", get(get_mastering))
        .route("/tracks/:track_id/mastering/refresh", post(refresh_mastering))
        .route("/tracks/:track_id/mastering/download", get(download_mastered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_filename_sanitizes() {
        assert_eq!(
            download_filename("My/Track: Two", "audio/wav"),
            "My_Track_ Two - mastered.wav"
        );
        assert_eq!(download_filename("", "audio/mpeg"), "track - mastered.mp3");
        assert_eq!(
            download_filename("Plain", "application/octet-stream"),
            "Plain - mastered.audio"
        );
    }

    #[test]
    fn test_overrides_parse_output_format() {
        let request = SubmitMasteringRequest {
            output_format: Some("mp3".to_string()),
            ..Default::default()
        };
        let overrides = request.to_overrides().unwrap();
        assert_eq!(overrides.output_format, Some(OutputFormat::Mp3));

        let bad = SubmitMasteringRequest {
            output_format: Some("ogg".to_string()),
            ..Default::default()
        };
        assert!(bad.to_overrides().is_err());
    }

    #[test]
    fn test_empty_request_is_empty_overrides() {
        let request = SubmitMasteringRequest::default();
        let overrides = request.to_overrides().unwrap();
        assert!(overrides.is_empty());
        assert!(!request.force);
    }
}
