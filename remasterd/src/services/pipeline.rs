//! Mastering pipeline
//!
//! Drives a track through tag embedding, source upload, job creation, and
//! status polling, persisting progress in the track's mastering meta.
//!
//! Concurrency model: every read-modify-write of one track's mastering
//! meta runs under that track's lock. Remote calls happen outside the
//! lock; when a writer re-acquires it, the snapshot it acted on is
//! re-validated (attempt nonce for submissions, job id for polls) and the
//! result is discarded if another submission got there first.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use remaster_client::store::keys;
use remaster_client::{JobId, JobReport, JobState, JobStore, ParameterOverrides};

use crate::db::tracks;
use crate::services::{hasher, tagger};
use crate::AppState;

/// Per-track mastering locks.
#[derive(Clone, Default)]
pub struct EntityLocks {
    inner: Arc<RwLock<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl EntityLocks {
    pub async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.write().await;
            map.entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Result of a submission attempt.
#[derive(Debug, PartialEq)]
pub enum SubmitOutcome {
    /// A new remote job was created.
    Submitted { job_id: String },
    /// Source audio unchanged since the last submission; nothing was sent.
    SkippedUnchanged,
    /// Another submission for this track started while ours was in flight;
    /// its meta won and our result was discarded.
    Superseded,
}

/// Result of a status refresh.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// No job recorded for this track.
    NoJob,
    /// Remote status fetched and applied.
    Updated { state: JobState, report: JobReport },
    /// The poll attempt failed; the previous report is kept.
    PollFailed { message: String },
    /// The job exceeded the completion horizon and was marked failed.
    GaveUp,
    /// A different job replaced this one while the poll was in flight.
    Superseded,
}

/// Submit a track for mastering.
///
/// Tags are embedded first so the change hash covers metadata edits as
/// well as audio edits. Unless `force` is set, a track whose hash matches
/// the previous submission (and whose job is pending, processing, or
/// completed) is skipped. Otherwise any previous job's meta is cleared,
/// the source is uploaded, and a new job is created.
pub async fn submit(
    state: &AppState,
    track_id: Uuid,
    overrides: &ParameterOverrides,
    force: bool,
) -> Result<SubmitOutcome> {
    let track = tracks::get_track(&state.db, track_id)
        .await?
        .ok_or_else(|| anyhow!("Track {} not found", track_id))?;

    let entity = track_id.to_string();
    let source_path = PathBuf::from(&track.file_path);

    let prepared: Result<String> = async {
        if state.config.tagging.enabled {
            tagger::embed_track_tags(&source_path, &track)
                .await
                .context("Tag embedding failed")?;
        }
        hasher::file_sha256(&source_path)
            .await
            .with_context(|| format!("Failed to hash source file {}", track.file_path))
    }
    .await;

    let source_hash = match prepared {
        Ok(hash) => hash,
        Err(e) => {
            let _guard = state.locks.lock(track_id).await;
            state
                .store
                .set(&entity, keys::STATE, JobState::Failed.as_str())
                .await?;
            state
                .store
                .set(&entity, keys::MESSAGE, &format!("Submission failed: {:#}", e))
                .await?;
            return Err(e);
        }
    };

    // Nonce identifying this submission attempt across the unlocked gap.
    let attempt = Uuid::new_v4().to_string();

    {
        let _guard = state.locks.lock(track_id).await;

        if !force {
            let previous_hash = state.store.get(&entity, keys::SOURCE_HASH).await?;
            let current = read_state(state, &entity).await?;
            let covered = matches!(
                current,
                Some(JobState::PendingSubmission)
                    | Some(JobState::SubmittedProcessing)
                    | Some(JobState::Completed)
            );
            if covered && previous_hash.as_deref() == Some(source_hash.as_str()) {
                tracing::info!(%track_id, "Source unchanged, skipping resubmission");
                return Ok(SubmitOutcome::SkippedUnchanged);
            }
        }

        // Clear everything tied to the previous job before a new one exists,
        // so readers never see an old job id next to a new state.
        for key in [
            keys::JOB_ID,
            keys::REPORT,
            keys::OUTPUT_AUDIO_ID,
            keys::SUBMITTED_AT,
        ] {
            state.store.delete(&entity, key).await?;
        }
        state
            .store
            .set(&entity, keys::STATE, JobState::PendingSubmission.as_str())
            .await?;
        state.store.set(&entity, keys::ATTEMPT, &attempt).await?;
        state
            .store
            .set(&entity, keys::SOURCE_HASH, &source_hash)
            .await?;
        state
            .store
            .set(&entity, keys::MESSAGE, "Preparing submission")
            .await?;
    }

    // Slow path without the lock: upload, then create the remote job.
    let result: Result<String> = async {
        let audio_id = state.client.upload(&source_path).await?;
        tracing::info!(%track_id, audio_id = %audio_id, "Uploaded source audio");

        let job_id = state.client.create_job(&audio_id, overrides).await?;
        Ok(job_id.as_str().to_string())
    }
    .await;

    let _guard = state.locks.lock(track_id).await;

    let current_attempt = state.store.get(&entity, keys::ATTEMPT).await?;
    if current_attempt.as_deref() != Some(attempt.as_str()) {
        tracing::warn!(%track_id, "Submission superseded while in flight, discarding result");
        return Ok(SubmitOutcome::Superseded);
    }

    match result {
        Ok(job_id) => {
            state.store.set(&entity, keys::JOB_ID, &job_id).await?;
            state
                .store
                .set(&entity, keys::STATE, JobState::SubmittedProcessing.as_str())
                .await?;
            state
                .store
                .set(&entity, keys::SUBMITTED_AT, &Utc::now().to_rfc3339())
                .await?;
            state
                .store
                .set(&entity, keys::MESSAGE, "Mastering job submitted")
                .await?;
            tracing::info!(%track_id, %job_id, "Created mastering job");
            Ok(SubmitOutcome::Submitted { job_id })
        }
        Err(e) => {
            state
                .store
                .set(&entity, keys::STATE, JobState::Failed.as_str())
                .await?;
            state
                .store
                .set(&entity, keys::MESSAGE, &format!("Submission failed: {:#}", e))
                .await?;
            Err(e)
        }
    }
}

/// Poll the remote job for a track and fold the result into its meta.
pub async fn refresh(state: &AppState, track_id: Uuid) -> Result<RefreshOutcome> {
    let entity = track_id.to_string();

    let job_id = {
        let _guard = state.locks.lock(track_id).await;

        let Some(job_id) = state.store.get(&entity, keys::JOB_ID).await? else {
            return Ok(RefreshOutcome::NoJob);
        };

        // Jobs that never complete stop being polled after the horizon.
        if let Some(horizon) = state.config.scheduler.give_up_after() {
            let submitted_at = state.store.get(&entity, keys::SUBMITTED_AT).await?;
            let expired = submitted_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| {
                    let age = Utc::now().signed_duration_since(t.with_timezone(&Utc));
                    age.num_seconds() >= horizon.as_secs() as i64
                })
                .unwrap_or(false);
            let still_waiting = read_state(state, &entity)
                .await?
                .map(|s| s.wants_poll())
                .unwrap_or(false);

            if expired && still_waiting {
                state
                    .store
                    .set(&entity, keys::STATE, JobState::Failed.as_str())
                    .await?;
                state
                    .store
                    .set(
                        &entity,
                        keys::MESSAGE,
                        &format!(
                            "Gave up waiting for mastering after {} seconds",
                            horizon.as_secs()
                        ),
                    )
                    .await?;
                tracing::warn!(%track_id, %job_id, "Mastering job exceeded completion horizon");
                return Ok(RefreshOutcome::GaveUp);
            }
        }

        job_id
    };

    // Remote call without holding the lock.
    let poll = state.client.job_status(&JobId::new(job_id.clone())).await;

    let _guard = state.locks.lock(track_id).await;

    // A resubmission may have replaced the job while we were polling.
    let current_job = state.store.get(&entity, keys::JOB_ID).await?;
    if current_job.as_deref() != Some(job_id.as_str()) {
        tracing::warn!(%track_id, polled_job = %job_id, "Discarding stale poll result");
        return Ok(RefreshOutcome::Superseded);
    }

    match poll {
        Err(e) => {
            let message = format!("Status check failed: {}", e);
            state
                .store
                .set(&entity, keys::STATE, JobState::ErrorFetchingStatus.as_str())
                .await?;
            state.store.set(&entity, keys::MESSAGE, &message).await?;
            tracing::warn!(%track_id, %job_id, error = %e, "Mastering status poll failed");
            Ok(RefreshOutcome::PollFailed { message })
        }
        Ok(report) => {
            let report_json = serde_json::to_string(&report)?;
            state.store.set(&entity, keys::REPORT, &report_json).await?;

            let next_state = if report.is_completed() {
                match report.output_audio_id() {
                    Some(output) => {
                        state
                            .store
                            .set(&entity, keys::OUTPUT_AUDIO_ID, output)
                            .await?;
                    }
                    None => {
                        tracing::warn!(%track_id, %job_id, "Completed report has no output audio id");
                    }
                }
                state
                    .store
                    .set(&entity, keys::MESSAGE, "Mastering completed")
                    .await?;
                JobState::Completed
            } else if report.is_failed() {
                let message = report
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Mastering failed".to_string());
                state.store.set(&entity, keys::MESSAGE, &message).await?;
                JobState::Failed
            } else {
                state
                    .store
                    .set(
                        &entity,
                        keys::MESSAGE,
                        &format!("Mastering in progress ({}%)", report.progress_percent),
                    )
                    .await?;
                JobState::SubmittedProcessing
            };

            state
                .store
                .set(&entity, keys::STATE, next_state.as_str())
                .await?;
            tracing::info!(
                %track_id,
                %job_id,
                state = %next_state,
                progress = report.progress_percent,
                "Updated mastering status"
            );
            Ok(RefreshOutcome::Updated {
                state: next_state,
                report,
            })
        }
    }
}

/// Read-only snapshot of a track's mastering meta.
#[derive(Debug, Clone, Serialize)]
pub struct MasteringView {
    pub track_id: Uuid,
    pub state: Option<JobState>,
    pub job_id: Option<String>,
    pub progress_percent: u8,
    pub message: Option<String>,
    pub output_audio_id: Option<String>,
    pub submitted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<JobReport>,
}

/// Assemble the mastering view for a track, under its lock so the fields
/// are mutually consistent.
pub async fn view(state: &AppState, track_id: Uuid) -> Result<MasteringView> {
    let entity = track_id.to_string();
    let _guard = state.locks.lock(track_id).await;

    let job_state = read_state(state, &entity).await?;
    let report = match state.store.get(&entity, keys::REPORT).await? {
        Some(raw) => serde_json::from_str::<JobReport>(&raw).ok(),
        None => None,
    };
    let progress_percent = match (&job_state, &report) {
        (Some(JobState::Completed), _) => 100,
        (_, Some(report)) => report.progress_percent,
        _ => 0,
    };

    Ok(MasteringView {
        track_id,
        state: job_state,
        job_id: state.store.get(&entity, keys::JOB_ID).await?,
        progress_percent,
        message: state.store.get(&entity, keys::MESSAGE).await?,
        output_audio_id: state.store.get(&entity, keys::OUTPUT_AUDIO_ID).await?,
        submitted_at: state.store.get(&entity, keys::SUBMITTED_AT).await?,
        report,
    })
}

async fn read_state(state: &AppState, entity: &str) -> Result<Option<JobState>> {
    Ok(state
        .store
        .get(entity, keys::STATE)
        .await?
        .and_then(|raw| raw.parse::<JobState>().ok()))
}
