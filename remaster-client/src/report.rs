//! Normalized mastering job reports
//!
//! Across provider versions the status endpoint has answered in two
//! shapes: a flat object, or the same payload nested under `report_data`.
//! [`JobReport::from_response`] folds both into one deterministic struct
//! so callers can persist and compare reports without caring which shape
//! the remote happened to pick.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized status strings.
pub mod status {
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";
    pub const PROCESSING: &str = "processing";
    pub const UNKNOWN: &str = "unknown";
}

/// One status snapshot for a mastering job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    /// Remote status folded into the normalized vocabulary where
    /// recognized (`succeeded` folds to `completed`, `failure` to
    /// `failed`); unrecognized strings pass through verbatim so callers
    /// can keep polling.
    pub status: String,
    /// 0 when the remote omits progress.
    pub progress_percent: u8,
    /// The report payload: the `report_data` object when nested, the
    /// whole body otherwise.
    pub report: Map<String, Value>,
    pub error_message: Option<String>,
}

impl JobReport {
    /// Normalize a raw status response body.
    ///
    /// Total over any JSON value: non-object bodies yield an `unknown`
    /// status with an empty report rather than an error, so a single odd
    /// reply never wedges a polling loop.
    pub fn from_response(body: &Value) -> Self {
        let empty = Map::new();
        let top = body.as_object().unwrap_or(&empty);

        let report = match top.get("report_data").and_then(Value::as_object) {
            Some(nested) => nested.clone(),
            None => top.clone(),
        };

        let status = top
            .get("status")
            .and_then(Value::as_str)
            .map(normalize_status)
            .unwrap_or_else(|| status::UNKNOWN.to_string());

        let progress_percent = top
            .get("progress_percent")
            .or_else(|| top.get("progress"))
            .and_then(as_percent)
            .unwrap_or(0);

        let error_message = top
            .get("error_message")
            .or_else(|| report.get("error_message"))
            .and_then(Value::as_str)
            .map(str::to_string);

        JobReport {
            status,
            progress_percent,
            report,
            error_message,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == status::COMPLETED
    }

    pub fn is_failed(&self) -> bool {
        self.status == status::FAILED
    }

    /// Remote id of the mastered artifact, once the job completes.
    ///
    /// Completed reports have named it three ways across provider
    /// versions: `result_audio_id`, `output_audio_id`, or `outputs[0].id`.
    /// First present non-empty match wins.
    pub fn output_audio_id(&self) -> Option<&str> {
        for key in ["result_audio_id", "output_audio_id"] {
            if let Some(id) = self.report.get(key).and_then(Value::as_str) {
                if !id.is_empty() {
                    return Some(id);
                }
            }
        }
        self.report
            .get("outputs")?
            .as_array()?
            .first()?
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }
}

fn normalize_status(raw: &str) -> String {
    match raw {
        "succeeded" | "complete" | "completed" => status::COMPLETED.to_string(),
        "failed" | "failure" => status::FAILED.to_string(),
        other => other.to_string(),
    }
}

fn as_percent(value: &Value) -> Option<u8> {
    let pct = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(pct.clamp(0.0, 100.0).round() as u8)
}
