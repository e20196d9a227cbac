//! Mastering job state machine vocabulary
//!
//! Job state lives with the host, persisted through its
//! [`JobStore`](crate::JobStore); the client only defines the vocabulary
//! and its predicates. Lifecycle:
//!
//! pending_submission → submitted_processing → completed | failed,
//! with error_fetching_status as a retryable detour when a poll fails.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Lifecycle of one mastering job, as persisted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Submission requested; nothing confirmed remotely yet.
    PendingSubmission,
    /// The remote accepted the job and is processing it.
    SubmittedProcessing,
    /// Terminal. The mastered artifact is ready for download.
    Completed,
    /// Terminal. Submission or processing failed.
    Failed,
    /// The last status poll failed; the job may still be running remotely.
    ErrorFetchingStatus,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::PendingSubmission => "pending_submission",
            JobState::SubmittedProcessing => "submitted_processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::ErrorFetchingStatus => "error_fetching_status",
        }
    }

    /// Terminal states accept no further polling.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// States a background poller should keep refreshing.
    pub fn wants_poll(&self) -> bool {
        matches!(
            self,
            JobState::SubmittedProcessing | JobState::ErrorFetchingStatus
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_submission" => Ok(JobState::PendingSubmission),
            "submitted_processing" => Ok(JobState::SubmittedProcessing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "error_fetching_status" => Ok(JobState::ErrorFetchingStatus),
            other => Err(Error::InvalidParameter {
                field: "job_state",
                message: format!("unknown state '{}'", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_strings() {
        for state in [
            JobState::PendingSubmission,
            JobState::SubmittedProcessing,
            JobState::Completed,
            JobState::Failed,
            JobState::ErrorFetchingStatus,
        ] {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
        assert!("half_done".parse::<JobState>().is_err());
    }

    #[test]
    fn terminal_and_pollable_sets_are_disjoint() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::SubmittedProcessing.is_terminal());

        assert!(JobState::SubmittedProcessing.wants_poll());
        assert!(JobState::ErrorFetchingStatus.wants_poll());
        assert!(!JobState::PendingSubmission.wants_poll());
        assert!(!JobState::Completed.wants_poll());
    }
}
