//! Mastering parameter model
//!
//! Parameter defaults are injected through [`ClientConfig`](crate::ClientConfig);
//! nothing in this crate hardcodes a loudness target or format. On the wire
//! the create-job endpoint takes a multipart form with the provider's
//! camelCase field names.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Output container format accepted by the mastering service.
///
/// The only parameter with a known closed value set; everything else is
/// passed through to the provider unvalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Wav,
    Mp3,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
        }
    }

    /// File extension for a mastered artifact in this format.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "audio/wav",
            OutputFormat::Mp3 => "audio/mpeg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            other => Err(Error::InvalidParameter {
                field: "outputFormat",
                message: format!("unsupported format '{}', expected wav or mp3", other),
            }),
        }
    }
}

/// Effective mastering parameters for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteringParameters {
    /// Integrated loudness target in LUFS.
    pub target_loudness: f64,
    pub output_format: OutputFormat,
    /// Provider-side algorithm selector, passed through as-is.
    pub algorithm: String,
    pub bass_preservation: bool,
    /// Additional form fields forwarded verbatim, in stable order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl MasteringParameters {
    /// Multipart form fields in the provider's camelCase naming.
    ///
    /// Numbers and booleans are stringified because the endpoint takes a
    /// form, not JSON. `inputAudioId` is not included here; job creation
    /// contributes it.
    pub fn to_form_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            (
                "targetLoudness".to_string(),
                self.target_loudness.to_string(),
            ),
            (
                "outputFormat".to_string(),
                self.output_format.as_str().to_string(),
            ),
            ("masteringAlgorithm".to_string(), self.algorithm.clone()),
            (
                "bassPreservation".to_string(),
                self.bass_preservation.to_string(),
            ),
        ];
        for (name, value) in &self.extra {
            fields.push((name.clone(), value.clone()));
        }
        fields
    }
}

/// Per-job overrides applied on top of the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverrides {
    pub target_loudness: Option<f64>,
    pub output_format: Option<OutputFormat>,
    pub algorithm: Option<String>,
    pub bass_preservation: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ParameterOverrides {
    /// Merge these overrides onto `defaults`, yielding the effective set.
    /// Extra fields accumulate; an override wins on key collision.
    pub fn apply(&self, defaults: &MasteringParameters) -> MasteringParameters {
        let mut params = defaults.clone();
        if let Some(loudness) = self.target_loudness {
            params.target_loudness = loudness;
        }
        if let Some(format) = self.output_format {
            params.output_format = format;
        }
        if let Some(algorithm) = &self.algorithm {
            params.algorithm = algorithm.clone();
        }
        if let Some(bass) = self.bass_preservation {
            params.bass_preservation = bass;
        }
        params
            .extra
            .extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }

    pub fn is_empty(&self) -> bool {
        self.target_loudness.is_none()
            && self.output_format.is_none()
            && self.algorithm.is_none()
            && self.bass_preservation.is_none()
            && self.extra.is_empty()
    }
}
