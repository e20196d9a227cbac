//! Client library for a remote AI mastering service
//!
//! Wraps the provider's REST API: audio upload, mastering job creation,
//! status polling, and download resolution. The client owns nothing but
//! its HTTP transport and configuration; job state, scheduling, and
//! persistence belong to the host, which plugs storage in through
//! [`JobStore`].

pub mod client;
pub mod error;
pub mod params;
pub mod report;
pub mod state;
pub mod store;

pub use client::{
    AudioDownload, AudioId, ClientConfig, DownloadInfo, DownloadSource, DownloadToken, JobId,
    MasteringClient,
};
pub use error::{Error, Result};
pub use params::{MasteringParameters, OutputFormat, ParameterOverrides};
pub use report::JobReport;
pub use state::JobState;
pub use store::JobStore;
