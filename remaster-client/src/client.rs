//! Mastering API client
//!
//! One HTTP client for the provider's REST surface: `POST /audios`
//! (upload), `POST /masterings` (job creation), `GET /masterings/{id}`
//! (status), and the two-step download flow
//! (`GET /audios/{id}/download_token`, then
//! `GET /audios/download_by_token`). All requests carry a Bearer
//! credential; all state stays with the caller.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::error::{Error, Result};
use crate::params::{MasteringParameters, ParameterOverrides};
use crate::report::JobReport;

/// Opaque remote id of an uploaded or mastered audio file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioId(String);

impl AudioId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AudioId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for AudioId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Opaque remote id of a mastering job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Short-lived token resolved from an audio id for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadToken(String);

impl DownloadToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client configuration, injected by the host.
///
/// Mastering parameter defaults are part of the config: the client
/// hardcodes no audio policy of its own.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Provider API root, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// Bearer credential. Operations fail with [`Error::AuthMissing`]
    /// before sending anything when this is absent or empty.
    pub api_key: Option<String>,
    /// Deadline for metadata-sized requests.
    pub request_timeout: Duration,
    /// Deadline for requests that move whole audio files (upload and
    /// download); covers the full body transfer.
    pub transfer_timeout: Duration,
    pub user_agent: String,
    /// Baseline mastering parameters; per-job overrides merge onto these.
    pub defaults: MasteringParameters,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, defaults: MasteringParameters) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
            transfer_timeout: Duration::from_secs(120),
            user_agent: format!("remaster/{}", env!("CARGO_PKG_VERSION")),
            defaults,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Which download endpoint to hit.
///
/// The token flow is the documented one. `Audio` hits the provider's
/// direct `/download` path and exists for callers that skip token
/// resolution.
#[derive(Debug, Clone, Copy)]
pub enum DownloadSource<'a> {
    Token(&'a DownloadToken),
    Audio(&'a AudioId),
}

/// An open mastered-audio download.
///
/// Wraps the live response; the body is pulled chunk by chunk and never
/// buffered whole.
pub struct AudioDownload {
    content_type: Option<String>,
    content_length: Option<u64>,
    response: reqwest::Response,
}

impl AudioDownload {
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Length advertised by the provider, when it sent one.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// The raw streaming response, for callers that forward the body
    /// (e.g. into an HTTP proxy response).
    pub fn into_inner(self) -> reqwest::Response {
        self.response
    }

    /// Copy the download into `dest` chunk by chunk. Returns the number
    /// of bytes written.
    pub async fn copy_to<W>(self, dest: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut response = self.response;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            dest.write_all(&chunk).await.map_err(Error::Io)?;
            written += chunk.len() as u64;
        }
        dest.flush().await.map_err(Error::Io)?;
        Ok(written)
    }
}

/// Result of a completed streaming copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadInfo {
    pub bytes_written: u64,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Client for the provider's mastering REST API.
#[derive(Clone)]
pub struct MasteringClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    transfer_timeout: Duration,
    defaults: MasteringParameters,
}

impl MasteringClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            transfer_timeout: config.transfer_timeout,
            defaults: config.defaults,
        })
    }

    /// The configured baseline parameters.
    pub fn defaults(&self) -> &MasteringParameters {
        &self.defaults
    }

    /// Upload a local audio file, yielding the remote id that mastering
    /// jobs reference as their input.
    pub async fn upload(&self, path: &Path) -> Result<AudioId> {
        let token = self.bearer()?;

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        if !metadata.is_file() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let mime = sniff_mime(path);

        tracing::debug!(
            path = %path.display(),
            size = metadata.len(),
            mime = %mime,
            "Uploading audio"
        );

        let file = tokio::fs::File::open(path).await.map_err(Error::Io)?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, metadata.len())
            .file_name(file_name)
            .mime_str(&mime)?;

        let response = self
            .http
            .post(self.url("/audios"))
            .bearer_auth(token)
            .timeout(self.transfer_timeout)
            .multipart(Form::new().part("file", part))
            .send()
            .await?;

        let body = self.parse_json(response).await?;
        let id = require_id(&body, "audio upload")?;
        tracing::info!(audio_id = %id, "Audio uploaded");
        Ok(AudioId(id))
    }

    /// Create a mastering job for an uploaded audio file.
    ///
    /// The endpoint takes a multipart form, not JSON; field names are the
    /// provider's camelCase spellings. Overrides merge onto the
    /// configured defaults.
    pub async fn create_job(
        &self,
        input: &AudioId,
        overrides: &ParameterOverrides,
    ) -> Result<JobId> {
        let token = self.bearer()?;
        let params = overrides.apply(&self.defaults);

        let mut form = Form::new().text("inputAudioId", input.as_str().to_string());
        for (name, value) in params.to_form_fields() {
            form = form.text(name, value);
        }

        tracing::debug!(
            input_audio_id = %input,
            target_loudness = params.target_loudness,
            output_format = %params.output_format,
            "Creating mastering job"
        );

        let response = self
            .http
            .post(self.url("/masterings"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        let body = self.parse_json(response).await?;
        let id = require_id(&body, "job creation")?;
        tracing::info!(job_id = %id, "Mastering job created");
        Ok(JobId(id))
    }

    /// Fetch and normalize the current status of a job.
    ///
    /// Read-only and idempotent: identical remote state yields an
    /// identical [`JobReport`]. Persistence and polling cadence are the
    /// caller's.
    pub async fn job_status(&self, job: &JobId) -> Result<JobReport> {
        let token = self.bearer()?;
        if job.as_str().is_empty() {
            return Err(Error::JobIdMissing);
        }

        let response = self
            .http
            .get(self.url(&format!("/masterings/{}", job.as_str())))
            .bearer_auth(token)
            .send()
            .await?;

        let body = self.parse_json(response).await?;
        Ok(JobReport::from_response(&body))
    }

    /// First step of the download flow: exchange an audio id for a
    /// short-lived download token.
    pub async fn download_token(&self, audio: &AudioId) -> Result<DownloadToken> {
        let token = self.bearer()?;

        let response = self
            .http
            .get(self.url(&format!("/audios/{}/download_token", audio.as_str())))
            .bearer_auth(token)
            .send()
            .await?;

        let body = self.parse_json(response).await?;
        body.get("audio_download_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(DownloadToken::new)
            .ok_or_else(|| Error::MalformedResponse {
                context: "download token response carries no audio_download_token".to_string(),
            })
    }

    /// Open a mastered-audio download without buffering it.
    pub async fn open_download(&self, source: DownloadSource<'_>) -> Result<AudioDownload> {
        let token = self.bearer()?;

        let request = match source {
            DownloadSource::Token(t) => self
                .http
                .get(self.url("/audios/download_by_token"))
                .query(&[("audio_download_token", t.as_str())]),
            DownloadSource::Audio(id) => self
                .http
                .get(self.url(&format!("/audios/{}/download", id.as_str()))),
        };

        let response = request
            .bearer_auth(token)
            .timeout(self.transfer_timeout)
            .send()
            .await?;
        let response = self.check(response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = response.content_length();

        Ok(AudioDownload {
            content_type,
            content_length,
            response,
        })
    }

    /// Resolve a download and copy it into `dest` chunk by chunk.
    pub async fn stream_to<W>(
        &self,
        source: DownloadSource<'_>,
        dest: &mut W,
    ) -> Result<DownloadInfo>
    where
        W: AsyncWrite + Unpin,
    {
        let download = self.open_download(source).await?;
        let content_type = download.content_type().map(str::to_string);
        let content_length = download.content_length();
        let bytes_written = download.copy_to(dest).await?;

        if let Some(expected) = content_length {
            if expected != bytes_written {
                tracing::warn!(expected, bytes_written, "Download length mismatch");
            }
        }

        Ok(DownloadInfo {
            bytes_written,
            content_type,
            content_length,
        })
    }

    fn bearer(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(Error::AuthMissing)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Shared status check: non-2xx becomes [`Error::RemoteRejected`]
    /// carrying the exact status and the provider's message when the body
    /// has one.
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::RemoteRejected {
            status: status.as_u16(),
            message: rejection_message(status, &body),
        })
    }

    async fn parse_json(&self, response: reqwest::Response) -> Result<Value> {
        let response = self.check(response).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| Error::MalformedResponse {
                context: format!("body is not JSON: {}", e),
            })
    }
}

fn require_id(body: &Value, what: &str) -> Result<String> {
    body.get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::MalformedResponse {
            context: format!("{} response carries no id", what),
        })
}

fn rejection_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            if !message.is_empty() {
                return message.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("request rejected")
            .to_string();
    }
    truncate(trimmed, 512)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Sniff the upload MIME type from file content, falling back to the
/// extension when the header bytes are unrecognized.
fn sniff_mime(path: &Path) -> String {
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        return kind.mime_type().to_string();
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("aif") | Some("aiff") => "audio/aiff",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::OutputFormat;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn test_config() -> ClientConfig {
        ClientConfig::new(
            "http://localhost:1",
            MasteringParameters {
                target_loudness: -10.0,
                output_format: OutputFormat::Wav,
                algorithm: "default".to_string(),
                bass_preservation: true,
                extra: BTreeMap::new(),
            },
        )
    }

    #[test]
    fn client_creation_succeeds() {
        assert!(MasteringClient::new(test_config()).is_ok());
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let mut config = test_config();
        config.base_url = "http://localhost:1/v2/".to_string();
        let client = MasteringClient::new(config).unwrap();
        assert_eq!(client.url("/audios"), "http://localhost:1/v2/audios");
    }

    #[test]
    fn bearer_rejects_missing_and_empty_keys() {
        let client = MasteringClient::new(test_config()).unwrap();
        assert!(matches!(client.bearer(), Err(Error::AuthMissing)));

        let client = MasteringClient::new(test_config().with_api_key("")).unwrap();
        assert!(matches!(client.bearer(), Err(Error::AuthMissing)));

        let client = MasteringClient::new(test_config().with_api_key("k")).unwrap();
        assert_eq!(client.bearer().unwrap(), "k");
    }

    #[test]
    fn rejection_message_prefers_json_message_field() {
        let status = reqwest::StatusCode::INTERNAL_SERVER_ERROR;
        assert_eq!(
            rejection_message(status, r#"{"message":"boom"}"#),
            "boom"
        );
        assert_eq!(rejection_message(status, "plain text"), "plain text");
        assert_eq!(rejection_message(status, ""), "Internal Server Error");
    }

    #[test]
    fn require_id_rejects_missing_or_empty() {
        assert_eq!(require_id(&json!({"id":"a1"}), "x").unwrap(), "a1");
        assert!(matches!(
            require_id(&json!({}), "x"),
            Err(Error::MalformedResponse { .. })
        ));
        assert!(matches!(
            require_id(&json!({"id":""}), "x"),
            Err(Error::MalformedResponse { .. })
        ));
        assert!(matches!(
            require_id(&json!({"id":42}), "x"),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn mime_falls_back_to_extension() {
        assert_eq!(sniff_mime(Path::new("/no/such/track.wav")), "audio/wav");
        assert_eq!(sniff_mime(Path::new("/no/such/track.MP3")), "audio/mpeg");
        assert_eq!(
            sniff_mime(Path::new("/no/such/track.xyz")),
            "application/octet-stream"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "héllo".repeat(200);
        let cut = truncate(&text, 512);
        assert!(cut.len() <= 515);
        assert!(cut.ends_with("..."));
    }
}
