//! Gemini client: multimodal segment summarizer and clip-finder reasoner.
//!
//! Both calls use structured output (a response schema derived from the
//! wire types in `sclip-models`), so replies parse directly into typed
//! responses. Segment files are pushed through the Files API first and
//! referenced by URI.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sclip_models::{FoundClip, FoundClipsResponse, SegmentSummaryResponse};

use crate::error::{WatcherError, WatcherResult};
use crate::summarizer::{ClipReasoner, Summarizer};

const API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Models to try in order; the first that answers wins.
const MODELS: [&str; 3] = ["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"];

/// How long to wait for an uploaded file to become ACTIVE.
const UPLOAD_POLL_INTERVAL: Duration = Duration::from_secs(2);
const UPLOAD_POLL_ATTEMPTS: u32 = 60;

/// Gemini API client.
pub struct GeminiClient {
    api_key: String,
    http: Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "fileData", skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file_data: None,
        }
    }

    fn file(uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            text: None,
            file_data: Some(FileData {
                file_uri: uri.into(),
                mime_type: mime_type.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct FileData {
    #[serde(rename = "fileUri")]
    file_uri: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: GeminiFile,
}

#[derive(Debug, Deserialize)]
struct GeminiFile {
    name: String,
    uri: String,
    state: Option<String>,
}

impl GeminiClient {
    /// Create a new Gemini client.
    pub fn new() -> WatcherResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| WatcherError::config_error("GEMINI_API_KEY not set"))?;

        Ok(Self {
            api_key,
            http: Client::new(),
        })
    }

    /// Upload a segment file and wait until it is ready for inference.
    async fn upload_segment(&self, path: &Path) -> WatcherResult<GeminiFile> {
        let bytes = tokio::fs::read(path).await?;
        debug!("Uploading {} ({} bytes) to Gemini", path.display(), bytes.len());

        let url = format!("{}/upload/v1beta/files?key={}", API_BASE, self.api_key);
        let response = self
            .http
            .post(&url)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", "video/mp4")
            .body(bytes)
            .send()
            .await
            .map_err(|e| WatcherError::ai_failed(format!("file upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WatcherError::ai_failed(format!(
                "file upload returned {}: {}",
                status, body
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| WatcherError::ai_failed(format!("bad upload response: {}", e)))?;

        self.wait_until_active(uploaded.file).await
    }

    /// Poll the Files API until the file leaves PROCESSING.
    async fn wait_until_active(&self, mut file: GeminiFile) -> WatcherResult<GeminiFile> {
        for _ in 0..UPLOAD_POLL_ATTEMPTS {
            match file.state.as_deref() {
                None | Some("ACTIVE") => return Ok(file),
                Some("FAILED") => {
                    return Err(WatcherError::ai_failed(format!(
                        "uploaded file {} failed processing",
                        file.name
                    )))
                }
                _ => {}
            }

            tokio::time::sleep(UPLOAD_POLL_INTERVAL).await;

            let url = format!("{}/v1beta/{}?key={}", API_BASE, file.name, self.api_key);
            file = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|e| WatcherError::ai_failed(format!("file poll failed: {}", e)))?
                .json()
                .await
                .map_err(|e| WatcherError::ai_failed(format!("bad file poll response: {}", e)))?;
        }

        Err(WatcherError::ai_failed(format!(
            "uploaded file {} never became active",
            file.name
        )))
    }

    /// Run a structured-output generation, falling back across models.
    async fn generate<T>(&self, parts: Vec<Part>, schema: serde_json::Value) -> WatcherResult<T>
    where
        T: DeserializeOwned,
    {
        let mut last_error = None;

        for model in MODELS {
            let request = GeminiRequest {
                contents: vec![Content {
                    parts: parts.clone(),
                }],
                generation_config: GenerationConfig {
                    response_mime_type: "application/json".to_string(),
                    response_schema: schema.clone(),
                },
            };

            match self.call_model(model, &request).await {
                Ok(text) => {
                    return serde_json::from_str(strip_code_fences(&text)).map_err(|e| {
                        WatcherError::ai_failed(format!("failed to parse {} response: {}", model, e))
                    });
                }
                Err(e) => {
                    warn!("Gemini model {} failed: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| WatcherError::ai_failed("all Gemini models failed")))
    }

    async fn call_model(&self, model: &str, request: &GeminiRequest) -> WatcherResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            API_BASE, model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| WatcherError::ai_failed(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WatcherError::ai_failed(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| WatcherError::ai_failed(format!("bad Gemini response: {}", e)))?;

        parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| WatcherError::ai_failed("no content in Gemini response"))
    }
}

#[async_trait]
impl Summarizer for GeminiClient {
    async fn summarize_segment(
        &self,
        segment: &Path,
        context: &str,
        last_tail: &str,
        streamer_name: &str,
    ) -> WatcherResult<SegmentSummaryResponse> {
        let file = self.upload_segment(segment).await?;
        info!("Summarizing segment {}", segment.display());

        let prompt = summary_prompt(context, last_tail, streamer_name);
        let parts = vec![Part::file(file.uri, "video/mp4"), Part::text(prompt)];
        self.generate(parts, response_schema::<SegmentSummaryResponse>()?)
            .await
    }
}

#[async_trait]
impl ClipReasoner for GeminiClient {
    async fn propose_clips(&self, prompt: &str) -> WatcherResult<Vec<FoundClip>> {
        let response: FoundClipsResponse = self
            .generate(
                vec![Part::text(prompt)],
                response_schema::<FoundClipsResponse>()?,
            )
            .await?;

        Ok(response.found_clips.into_iter().map(Into::into).collect())
    }
}

/// The per-segment analysis prompt.
fn summary_prompt(context: &str, last_tail: &str, streamer_name: &str) -> String {
    format!(
        r#"Here is a clip from a much longer live stream by {streamer_name}. Here is the context of what has happened up to this clip: {context}. More specifically, here is what happened just before this video was taken: {last_tail}.
Give a detailed, specific analysis of this video. These descriptions will be passed to another AI agent which decides which parts of the stream to turn into viral clips, so make them as detailed as possible. You should specify each event in the video, using this format:

0:16-0:25 {streamer_name}'s friend makes fun of how they told everyone about the new girlfriend
0:25-0:27 {streamer_name}'s friend asks "Oh you telling them you got a girlfriend" as a joke
0:47-0:51 {streamer_name}'s friend says "Put them on a chair" and everyone laughs
1:07-1:14 {streamer_name}'s friends comment on how much they are smiling
1:58-2:02 {streamer_name}'s friends look at them like they are annoyed and laughing

You must specify what happens in the last ~20 seconds of the video (as it cuts off). You should also update the context so that it is representative of the previous context and the events of this video."#
    )
}

/// JSON Schema for a response type, inlined and stripped of the meta-schema
/// marker (the API rejects `$ref` and unknown top-level keys).
fn response_schema<T: JsonSchema>() -> WatcherResult<serde_json::Value> {
    let mut settings = schemars::gen::SchemaSettings::default();
    settings.inline_subschemas = true;
    settings.meta_schema = None;
    let schema = settings.into_generator().into_root_schema_for::<T>();
    serde_json::to_value(schema)
        .map_err(|e| WatcherError::ai_failed(format!("schema generation failed: {}", e)))
}

/// Drop a leading ```json fence and trailing ``` if the model added them.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_prompt_carries_rolling_state() {
        let prompt = summary_prompt("mid-tournament", "just clutched a 1v3", "ginge");
        assert!(prompt.contains("mid-tournament"));
        assert!(prompt.contains("just clutched a 1v3"));
        assert!(prompt.contains("ginge's friend"));
        assert!(prompt.contains("last ~20 seconds"));
    }

    #[test]
    fn test_response_schema_is_inlined() {
        let schema = response_schema::<FoundClipsResponse>().unwrap();
        let rendered = serde_json::to_string(&schema).unwrap();
        assert!(!rendered.contains("$ref"));
        assert!(!rendered.contains("$schema"));
        assert_eq!(
            schema["properties"]["found_clips"]["items"]["properties"]["start_secs"]["type"],
            "integer"
        );
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_fenced_summary() {
        let text = "```json\n{\"stream_events\": [], \"updated_context\": \"c\", \"last_20_secs\": \"t\"}\n```";
        let parsed: SegmentSummaryResponse =
            serde_json::from_str(strip_code_fences(text)).unwrap();
        assert_eq!(parsed.updated_context, "c");
    }
}
