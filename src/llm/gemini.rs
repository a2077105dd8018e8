use std::time::Duration;

use futures_util::{pin_mut, Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::llm::generator::{GenerationError, GenerationRequest, ImageGenerator};
use crate::llm::media::{truncate_for_log, GeneratedImage};
use crate::llm::stream::SseDecoder;
use crate::utils::http::get_streaming_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub safety_settings: String,
    pub request_timeout: Option<Duration>,
}

impl GeminiSettings {
    pub fn from_config(config: &Config) -> Self {
        let request_timeout = if config.gemini_request_timeout_secs > 0 {
            Some(Duration::from_secs(config.gemini_request_timeout_secs))
        } else {
            None
        };
        Self {
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_image_model.clone(),
            base_url: config.gemini_base_url.clone(),
            safety_settings: config.gemini_safety_settings.clone(),
            request_timeout,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    error: Option<GeminiStreamError>,
}

/// Error object the service may send inside an otherwise successful stream.
#[derive(Debug, Deserialize)]
struct GeminiStreamError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

fn build_safety_settings(profile: &str) -> Vec<Value> {
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        "permissive" => "OFF",
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}', using permissive defaults.",
                profile
            );
            "OFF"
        }
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
    ]
}

fn build_gemini_parts(request: &GenerationRequest) -> Vec<Value> {
    let mut parts = vec![json!({ "text": request.prompt() })];
    for image in request.images() {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": image.to_base64()
            }
        }));
    }
    parts
}

pub fn build_gemini_payload(request: &GenerationRequest, safety_profile: &str) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": build_gemini_parts(request) }],
        "generationConfig": {
            "responseModalities": ["IMAGE", "TEXT"]
        },
        "safetySettings": build_safety_settings(safety_profile),
    })
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value) -> Value {
    let mut summary = Map::new();

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let role = content
                .get("role")
                .and_then(|value| value.as_str())
                .unwrap_or("user");
            let parts = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| summarize_gemini_parts(parts))
                .unwrap_or_default();
            summarized_contents.push(json!({ "role": role, "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        // Streaming errors arrive as a one-element array.
        let value = match value {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            other => other,
        };
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

/// Accumulates what the service said while waiting for the first image.
#[derive(Debug, Default)]
pub struct FragmentScan {
    commentary: String,
    block_reason: Option<String>,
    finish_reasons: Vec<String>,
    fragments: usize,
}

impl FragmentScan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, response: GeminiResponse) -> Option<GeneratedImage> {
        self.fragments += 1;

        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            self.block_reason = Some(reason);
        }

        if let Some(message) = response.error.and_then(|error| error.message) {
            warn!(target: "llm.gemini", "Gemini stream carried an error: {}", message);
            if !self.commentary.is_empty() {
                self.commentary.push(' ');
            }
            self.commentary.push_str(&format!("Service error: {message}"));
        }

        for candidate in response.candidates.unwrap_or_default() {
            if let Some(reason) = candidate.finish_reason {
                self.finish_reasons.push(reason);
            }
            let Some(parts) = candidate.content.and_then(|content| content.parts) else {
                continue;
            };
            for part in parts {
                match part {
                    GeminiPart::InlineData { inline_data }
                        if inline_data.mime_type.starts_with("image/") =>
                    {
                        return Some(GeneratedImage::new(
                            &inline_data.mime_type,
                            inline_data.data,
                        ));
                    }
                    GeminiPart::Text { text } => {
                        debug!(target: "llm.gemini", text = %truncate_for_log(&text, 200), "text fragment");
                        self.commentary.push_str(&text);
                    }
                    _ => {}
                }
            }
        }

        None
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn into_error(self, model: &str) -> GenerationError {
        let mut commentary = if self.commentary.trim().is_empty() {
            "No response text".to_string()
        } else {
            self.commentary
        };
        if let Some(reason) = self.block_reason {
            commentary.push_str(&format!(" (prompt blocked: {reason})"));
        } else if let Some(reason) = self
            .finish_reasons
            .iter()
            .find(|reason| reason.as_str() != "STOP")
        {
            commentary.push_str(&format!(" (finish reason: {reason})"));
        }
        GenerationError::NoImage {
            model: model.to_string(),
            commentary,
        }
    }
}

fn parse_fragment(event: &str, scan: &mut FragmentScan) -> Option<GeneratedImage> {
    let event = event.trim();
    if event.is_empty() || event == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<GeminiResponse>(event) {
        Ok(response) => scan.absorb(response),
        Err(err) => {
            warn!(
                "Skipping unparseable Gemini stream fragment: {} ({})",
                truncate_for_log(event, 200),
                err
            );
            None
        }
    }
}

/// Reads server-sent events until the first image fragment, then stops consuming.
pub async fn scan_event_stream<S, B, E>(
    stream: S,
    model: &str,
) -> Result<GeneratedImage, GenerationError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    pin_mut!(stream);
    let mut decoder = SseDecoder::new();
    let mut scan = FragmentScan::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| GenerationError::Transport(err.to_string()))?;
        for event in decoder.push(chunk.as_ref()) {
            if let Some(image) = parse_fragment(&event, &mut scan) {
                info!(
                    "Found image in Gemini stream after {} fragment(s) (mime={})",
                    scan.fragments(),
                    image.mime_type
                );
                return Ok(image);
            }
        }
    }

    if let Some(event) = decoder.finish() {
        if let Some(image) = parse_fragment(&event, &mut scan) {
            return Ok(image);
        }
    }

    warn!(
        "Gemini stream ended without an image after {} fragment(s)",
        scan.fragments()
    );
    Err(scan.into_error(model))
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    settings: GeminiSettings,
    http: Client,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self, GenerationError> {
        Self::with_http_client(settings, get_streaming_http_client().clone())
    }

    pub fn with_http_client(
        settings: GeminiSettings,
        http: Client,
    ) -> Result<Self, GenerationError> {
        if settings.api_key.trim().is_empty() {
            return Err(GenerationError::MissingApiKey);
        }
        Ok(Self { settings, http })
    }

    fn redact(&self, text: &str) -> String {
        let key = self.settings.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.settings.base_url, self.settings.model
        )
    }

    async fn stream_generate(&self, payload: Value) -> Result<GeneratedImage, GenerationError> {
        let model = self.settings.model.as_str();
        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(&payload);
            debug!(target: "llm.gemini", model = model, payload = %payload_summary);
        }

        let mut request = self
            .http
            .post(self.stream_url())
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&payload);
        if let Some(timeout) = self.settings.request_timeout {
            request = request.timeout(timeout);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let err_text = self.redact(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    err.status()
                );
                return Err(GenerationError::Transport(err_text));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            return Err(GenerationError::Service {
                status: status.as_u16(),
                detail: self.redact(&message.unwrap_or(body_summary)),
            });
        }

        scan_event_stream(response.bytes_stream(), model).await
    }
}

impl ImageGenerator for GeminiClient {
    fn has_credential(&self) -> bool {
        !self.settings.api_key.trim().is_empty()
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedImage, GenerationError> {
        if !self.has_credential() {
            return Err(GenerationError::MissingApiKey);
        }

        let payload = build_gemini_payload(request, &self.settings.safety_settings);
        let metadata = json!({
            "images": request.images().len(),
            "promptChars": request.prompt().chars().count(),
        });
        log_llm_timing(
            "gemini",
            &self.settings.model,
            request.operation(),
            Some(metadata),
            || self.stream_generate(payload),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::media::InlineImage;
    use futures_util::stream;

    fn sse(fragments: &[Value]) -> Vec<Result<Vec<u8>, std::io::Error>> {
        fragments
            .iter()
            .map(|fragment| Ok(format!("data: {}\r\n\r\n", fragment).into_bytes()))
            .collect()
    }

    fn text_fragment(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    fn image_fragment(mime_type: &str, data: &str) -> Value {
        json!({ "candidates": [{ "content": { "parts": [
            { "inlineData": { "mimeType": mime_type, "data": data } }
        ] } }] })
    }

    fn settings(api_key: &str) -> GeminiSettings {
        GeminiSettings {
            api_key: api_key.to_string(),
            model: "gemini-test-image".to_string(),
            base_url: "https://example.invalid/v1beta".to_string(),
            safety_settings: "permissive".to_string(),
            request_timeout: None,
        }
    }

    #[tokio::test]
    async fn returns_first_image_fragment() {
        let chunks = sse(&[
            text_fragment("Placing the spa on the deck."),
            image_fragment("image/png", "Zmlyc3Q="),
            image_fragment("image/png", "c2Vjb25k"),
        ]);
        let image = scan_event_stream(stream::iter(chunks), "m").await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "Zmlyc3Q=");
    }

    #[tokio::test]
    async fn stops_consuming_once_an_image_is_found() {
        let mut chunks = sse(&[image_fragment("image/jpeg", "AAAA")]);
        chunks.push(Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "should never be read",
        )));
        let image = scan_event_stream(stream::iter(chunks), "m").await.unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn text_only_stream_reports_commentary_verbatim() {
        let chunks = sse(&[
            text_fragment("I can't place a spa "),
            text_fragment("on a steep roof."),
        ]);
        let err = scan_event_stream(stream::iter(chunks), "gemini-test-image")
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("I can't place a spa on a steep roof."));
        assert!(message.contains("gemini-test-image"));
    }

    #[tokio::test]
    async fn empty_stream_mentions_missing_text() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = Vec::new();
        let err = scan_event_stream(stream::iter(chunks), "m").await.unwrap_err();
        assert!(matches!(err, GenerationError::NoImage { .. }));
        assert!(err.to_string().contains("No response text"));
    }

    #[tokio::test]
    async fn block_reason_is_reported() {
        let chunks = sse(&[json!({ "promptFeedback": { "blockReason": "SAFETY" } })]);
        let err = scan_event_stream(stream::iter(chunks), "m").await.unwrap_err();
        assert!(err.to_string().contains("prompt blocked: SAFETY"));
    }

    #[tokio::test]
    async fn error_fragment_message_is_reported() {
        let chunks = sse(&[
            text_fragment("Working on it."),
            json!({ "error": {
                "code": 429,
                "message": "quota exceeded",
                "status": "RESOURCE_EXHAUSTED"
            } }),
        ]);
        let err = scan_event_stream(stream::iter(chunks), "m").await.unwrap_err();
        assert!(matches!(err, GenerationError::NoImage { .. }));
        let message = err.to_string();
        assert!(message.contains("Working on it. Service error: quota exceeded"));
        assert!(!message.contains("No response text"));
    }

    #[tokio::test]
    async fn transport_errors_mid_stream_surface() {
        let mut chunks = sse(&[text_fragment("thinking")]);
        chunks.push(Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        )));
        let err = scan_event_stream(stream::iter(chunks), "m").await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_)));
    }

    #[tokio::test]
    async fn non_image_inline_data_and_unknown_parts_are_skipped() {
        let chunks = sse(&[
            json!({ "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "audio/wav", "data": "AAAA" } },
                { "functionCall": { "name": "noop" } }
            ] } }] }),
            image_fragment("image/webp", "BBBB"),
        ]);
        let image = scan_event_stream(stream::iter(chunks), "m").await.unwrap();
        assert_eq!(image.mime_type, "image/webp");
    }

    #[test]
    fn client_requires_api_key() {
        let err = GeminiClient::new(settings("  ")).unwrap_err();
        assert!(matches!(err, GenerationError::MissingApiKey));
    }

    #[test]
    fn payload_puts_instruction_before_images() {
        let request = GenerationRequest::Composite {
            prompt: "place the spa".to_string(),
            photo: InlineImage::new(vec![1, 2, 3], "image/jpg"),
            product: InlineImage::new(vec![4, 5], "image/png"),
        };
        let payload = build_gemini_payload(&request, "standard");
        let parts = payload.pointer("/contents/0/parts").unwrap().as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], "place the spa");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
        assert_eq!(parts[2]["inlineData"]["mimeType"], "image/png");
        assert_eq!(
            payload.pointer("/generationConfig/responseModalities"),
            Some(&json!(["IMAGE", "TEXT"]))
        );
        assert_eq!(
            payload.pointer("/safetySettings/0/threshold"),
            Some(&json!("BLOCK_MEDIUM_AND_ABOVE"))
        );
    }

    #[test]
    fn payload_summary_hides_image_bytes() {
        let request = GenerationRequest::ConversationalEdit {
            prompt: "relight".to_string(),
            image: InlineImage::new(vec![0; 30], "image/png"),
        };
        let summary = summarize_gemini_payload(&build_gemini_payload(&request, "permissive"));
        assert_eq!(summary.pointer("/contents/0/parts/1/inlineData/dataLen"), Some(&json!(40)));
        assert!(!summary.to_string().contains("AAAA"));
    }

    #[test]
    fn error_body_message_is_extracted_from_array_form() {
        let body = r#"[{"error": {"code": 400, "message": "API key not valid."}}]"#;
        let (message, _) = summarize_error_body(body);
        assert_eq!(message.as_deref(), Some("API key not valid."));
    }

    #[test]
    fn api_key_is_redacted() {
        let client = GeminiClient::with_http_client(settings("secret-key"), Client::new()).unwrap();
        assert_eq!(client.redact("bad key secret-key"), "bad key [redacted]");
        assert!(client.stream_url().ends_with("models/gemini-test-image:streamGenerateContent?alt=sse"));
    }
}
