//! Configuration for remasterd
//!
//! One TOML file for bootstrap settings. Priority: command line, then
//! environment, then the file, then built-in defaults. The credential is
//! usually supplied through `REMASTER_API_KEY` rather than the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use remaster_client::{ClientConfig, MasteringParameters, OutputFormat};

pub const API_KEY_ENV: &str = "REMASTER_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub mastering: MasteringConfig,
    pub scheduler: SchedulerConfig,
    pub tagging: TaggingConfig,
    pub segmenter: SegmenterConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5740,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("remaster.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Provider API root.
    pub base_url: String,
    /// Bearer credential; `REMASTER_API_KEY` wins over the file.
    pub key: Option<String>,
    pub request_timeout_secs: u64,
    /// Deadline for whole-file transfers (upload and download).
    pub transfer_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bakuage.com/v2".to_string(),
            key: None,
            request_timeout_secs: 30,
            transfer_timeout_secs: 120,
        }
    }
}

/// Baseline mastering parameters, injected into the client as its
/// defaults. Per-request overrides merge onto these.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MasteringConfig {
    pub target_loudness: f64,
    pub output_format: OutputFormat,
    pub algorithm: String,
    pub bass_preservation: bool,
}

impl Default for MasteringConfig {
    fn default() -> Self {
        Self {
            target_loudness: -10.0,
            output_format: OutputFormat::Wav,
            algorithm: "default".to_string(),
            bass_preservation: true,
        }
    }
}

impl MasteringConfig {
    pub fn to_parameters(&self) -> MasteringParameters {
        MasteringParameters {
            target_loudness: self.target_loudness,
            output_format: self.output_format,
            algorithm: self.algorithm.clone(),
            bass_preservation: self.bass_preservation,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between background status poll sweeps.
    pub poll_interval_secs: u64,
    /// Mark a job failed after this many seconds without completion.
    /// 0 disables the horizon.
    pub give_up_after_secs: u64,
    pub queue_depth: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            give_up_after_secs: 3600,
            queue_depth: 64,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn give_up_after(&self) -> Option<Duration> {
        if self.give_up_after_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.give_up_after_secs))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    /// Embed track metadata into the audio file before upload.
    pub enabled: bool,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// RMS level below which a window counts as silence.
    pub threshold_db: f64,
    /// Shorter silences are kept inside a sound region.
    pub min_silence_secs: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            threshold_db: -40.0,
            min_silence_secs: 0.2,
        }
    }
}

impl HostConfig {
    /// Load configuration from an optional TOML file, then apply the
    /// environment on top.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => HostConfig::default(),
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                config.api.key = Some(key);
            }
        }

        Ok(config)
    }

    /// Client configuration assembled from the api and mastering sections.
    pub fn client_config(&self) -> ClientConfig {
        let mut client =
            ClientConfig::new(self.api.base_url.clone(), self.mastering.to_parameters());
        client.api_key = self.api.key.clone();
        client.request_timeout = Duration::from_secs(self.api.request_timeout_secs);
        client.transfer_timeout = Duration::from_secs(self.api.transfer_timeout_secs);
        client
    }
}
