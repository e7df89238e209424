//! OpenAI-compatible chat completions provider.
//!
//! Groq, OpenAI and Ollama (under `/v1`) all expose the same
//! `POST {base}/chat/completions` endpoint, so one client covers them.
//! Streaming responses are server-sent events: `data: {json}` lines
//! terminated by `data: [DONE]`.

use crate::client::{
    ChatMessage, LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tabula_core::{AppError, AppResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Wire format of a chat completions request.
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: String,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireStreamEvent {
    choices: Vec<WireStreamChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct ChatCompletionsClient {
    /// Provider label reported by `provider_name`
    provider: String,

    /// Base URL, e.g. `https://api.groq.com/openai/v1`
    base_url: String,

    /// Bearer token, if the provider needs one
    api_key: Option<String>,

    client: reqwest::Client,
}

impl ChatCompletionsClient {
    /// Create a client for a provider at the given base URL.
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn to_wire<'a>(&self, request: &'a LlmRequest, stream: bool) -> WireRequest<'a> {
        WireRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
            stream,
        }
    }

    async fn send(&self, body: &WireRequest<'_>) -> AppResult<reqwest::Response> {
        let mut builder = self.client.post(self.endpoint()).json(body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            AppError::Completion(format!("Failed to send request to {}: {}", self.provider, e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Completion(format!(
                "{} API error ({}): {}",
                self.provider, status, error_text
            )));
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl LlmClient for ChatCompletionsClient {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to {}", self.provider);
        tracing::debug!("Request: {:?}", request);

        let response = self.send(&self.to_wire(request, false)).await?;

        let wire: WireResponse = response.json().await.map_err(|e| {
            AppError::Completion(format!("Failed to parse {} response: {}", self.provider, e))
        })?;

        let content = wire
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        let usage = wire
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content,
            model: if wire.model.is_empty() {
                request.model.clone()
            } else {
                wire.model
            },
            usage,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        tracing::info!("Starting streaming request to {}", self.provider);
        tracing::debug!("Request: {:?}", request);

        let response = self.send(&self.to_wire(request, true)).await?;

        // `None` marks the end of the body so the decoder can flush a final
        // line that has no trailing newline.
        let events = response
            .bytes_stream()
            .map(Some)
            .chain(futures::stream::once(futures::future::ready(None)))
            .scan(SseDecoder::default(), |decoder, item| {
                let items = match item {
                    Some(Ok(bytes)) => decoder.push(&bytes),
                    Some(Err(e)) => {
                        vec![Err(AppError::Completion(format!("Stream error: {}", e)))]
                    }
                    None => decoder.finish(),
                };
                futures::future::ready(Some(futures::stream::iter(items)))
            })
            .flatten();

        Ok(Box::pin(events))
    }
}

/// Incremental decoder for `data:` lines of a server-sent event stream.
///
/// Network chunks can end mid-line, so bytes are buffered until a newline
/// arrives.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<AppResult<LlmStreamChunk>> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.finished {
                continue;
            }
            if let Some(item) = self.decode_line(&String::from_utf8_lossy(&line)) {
                out.push(item);
            }
        }

        out
    }

    /// Decode whatever is left in the buffer once the stream has ended.
    pub(crate) fn finish(&mut self) -> Vec<AppResult<LlmStreamChunk>> {
        let rest = std::mem::take(&mut self.buffer);
        if self.finished || rest.is_empty() {
            return Vec::new();
        }
        self.decode_line(&String::from_utf8_lossy(&rest))
            .into_iter()
            .collect()
    }

    fn decode_line(&mut self, line: &str) -> Option<AppResult<LlmStreamChunk>> {
        let payload = line.trim().strip_prefix("data:")?.trim();

        if payload.is_empty() {
            return None;
        }

        if payload == "[DONE]" {
            self.finished = true;
            return Some(Ok(LlmStreamChunk::finished()));
        }

        let event: WireStreamEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                return Some(Err(AppError::Completion(format!(
                    "Failed to parse stream event: {}",
                    e
                ))))
            }
        };

        let content = event
            .choices
            .into_iter()
            .filter_map(|choice| choice.delta.content)
            .collect::<String>();

        let usage = event
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens));

        if content.is_empty() && usage.is_none() {
            return None;
        }

        Some(Ok(LlmStreamChunk {
            content,
            done: false,
            usage,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(items: Vec<AppResult<LlmStreamChunk>>) -> Vec<String> {
        items
            .into_iter()
            .map(|item| item.unwrap().content)
            .collect()
    }

    #[test]
    fn test_client_creation() {
        let client =
            ChatCompletionsClient::new("groq", "https://api.groq.com/openai/v1/", None).unwrap();
        assert_eq!(client.provider_name(), "groq");
        assert_eq!(
            client.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_wire_request_shape() {
        let client = ChatCompletionsClient::new("ollama", "http://localhost:11434/v1", None).unwrap();
        let request = LlmRequest::new("llama3.2")
            .with_system("sys")
            .with_user("question")
            .with_temperature(0.7)
            .with_max_tokens(1024);

        let json = serde_json::to_value(client.to_wire(&request, true)).unwrap();
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "question");
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["stream"], true);
        assert!(json.get("top_p").is_none());
    }

    #[test]
    fn test_sse_decoder_handles_split_lines() {
        let mut decoder = SseDecoder::default();

        let first = decoder.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel");
        assert!(first.is_empty());

        let second = decoder.push(
            b"lo\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n",
        );
        assert_eq!(contents(second), vec!["Hello", " world"]);
    }

    #[test]
    fn test_sse_decoder_stops_at_done() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push(
            b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\
              data: [DONE]\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        );

        let chunks: Vec<LlmStreamChunk> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "ok");
        assert!(chunks[1].done);
    }

    #[test]
    fn test_sse_decoder_flushes_unterminated_last_line() {
        let mut decoder = SseDecoder::default();

        let items = decoder.push(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Queens\"}}]}\n\
              data: {\"choices\":[{\"delta\":{\"content\":\" leads\"}}]}",
        );
        assert_eq!(contents(items), vec!["Queens"]);

        assert_eq!(contents(decoder.finish()), vec![" leads"]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_sse_decoder_ignores_leftover_after_done() {
        let mut decoder = SseDecoder::default();
        decoder.push(b"data: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}");
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_sse_decoder_reports_bad_json() {
        let mut decoder = SseDecoder::default();
        let items = decoder.push(b"data: {not json}\n");
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(AppError::Completion(_))));
    }
}
