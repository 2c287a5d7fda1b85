//! OpenAI-compatible chat-completion client.
//!
//! Works against any server speaking the `/chat/completions` protocol
//! (OpenAI, MLC-LLM REST, vLLM, llama.cpp server). Streaming uses
//! Server-Sent Events: `data: {json}` lines terminated by `data: [DONE]`.

use std::time::Duration;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use url::Url;

use crate::llm::client::{ChatModel, CompletionStream};
use crate::llm::config::{EndpointConfig, LlmConfig};
use crate::llm::error::{LlmError, LlmResult};
use crate::llm::types::{Completion, FinishReason, RequestMessage, StreamEvent, Usage};

/// Maximum number of body bytes kept in a status error.
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl OpenAiClient {
    /// Build a client from endpoint settings.
    ///
    /// # Errors
    /// Returns an error if the URL or API key is invalid, or the HTTP client
    /// cannot be built.
    pub fn new(config: &EndpointConfig) -> LlmResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| LlmError::InvalidConfig("api key is not a valid header".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.completions_url()?,
        })
    }

    async fn post(&self, body: &ChatRequestBody<'_>) -> LlmResult<reqwest::Response> {
        if let Ok(json) = serde_json::to_string(body) {
            trace!("request: {json}");
        }
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(
        &self,
        messages: &[RequestMessage],
        config: &LlmConfig,
    ) -> LlmResult<Completion> {
        let body = ChatRequestBody::new(messages, config, false);
        let response = self.post(&body).await?;
        let text = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&text)?;

        let choice = parsed.choices.into_iter().next();
        let stop_reason = choice.as_ref().and_then(|c| c.finish_reason);
        let content = choice
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        debug!(model = %config.model, chars = content.len(), "completion finished");
        Ok(Completion {
            text: content,
            stop_reason,
            usage: parsed.usage,
        })
    }

    async fn stream(
        &self,
        messages: &[RequestMessage],
        config: &LlmConfig,
    ) -> LlmResult<CompletionStream> {
        let body = ChatRequestBody::new(messages, config, true);
        let response = self.post(&body).await?;
        Ok(Box::pin(sse_events(response.bytes_stream())))
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

/// Turn a raw SSE byte stream into completion events.
///
/// Lines may be split across network chunks, possibly inside a multi-byte
/// character, so raw bytes are buffered and only whole lines are decoded.
/// A final line without a newline is still parsed when the stream ends.
fn sse_events<S, B>(bytes: S) -> impl Stream<Item = LlmResult<StreamEvent>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();
        let mut state = SseState::default();
        let mut done = false;

        'read: while let Some(next) = bytes.next().await {
            let chunk = next?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match state.apply(parse_sse_line(&String::from_utf8_lossy(&line))) {
                    Step::Done => {
                        done = true;
                        break 'read;
                    }
                    Step::Delta(text) => {
                        yield StreamEvent::Delta(text);
                    }
                    Step::Continue => {}
                }
            }
        }

        if !done && !buffer.is_empty() {
            let tail = String::from_utf8_lossy(&buffer).into_owned();
            if let Step::Delta(text) = state.apply(parse_sse_line(&tail)) {
                yield StreamEvent::Delta(text);
            }
        }

        if !state.produced {
            Err(LlmError::EmptyResponse)?;
        }

        yield StreamEvent::Finish {
            stop_reason: state.stop_reason,
            usage: state.usage,
        };
    }
}

/// Finish data accumulated across chunks.
#[derive(Debug, Default)]
struct SseState {
    stop_reason: Option<FinishReason>,
    usage: Option<Usage>,
    produced: bool,
}

/// What the stream should do after one line.
#[derive(Debug)]
enum Step {
    Done,
    Delta(String),
    Continue,
}

impl SseState {
    fn apply(&mut self, line: SseLine) -> Step {
        let chunk = match line {
            SseLine::Done => return Step::Done,
            SseLine::Ignored => return Step::Continue,
            SseLine::Chunk(chunk) => chunk,
        };
        if chunk.usage.is_some() {
            self.usage = chunk.usage;
        }
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Step::Continue;
        };
        if choice.finish_reason.is_some() {
            self.stop_reason = choice.finish_reason;
        }
        match choice.delta.content.filter(|t| !t.is_empty()) {
            Some(text) => {
                self.produced = true;
                Step::Delta(text)
            }
            None => Step::Continue,
        }
    }
}

/// Classification of a single SSE line.
#[derive(Debug)]
enum SseLine {
    /// `data: [DONE]`.
    Done,
    /// Blank line, comment, non-data field, or undecodable payload.
    Ignored,
    /// Decoded chunk.
    Chunk(ChunkResponse),
}

fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Ignored;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    if data.is_empty() {
        return SseLine::Ignored;
    }
    match serde_json::from_str::<ChunkResponse>(data) {
        Ok(chunk) => SseLine::Chunk(chunk),
        Err(err) => {
            warn!("failed to parse chunk: {err}, data: {data}");
            SseLine::Ignored
        }
    }
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [RequestMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

impl<'a> ChatRequestBody<'a> {
    fn new(messages: &'a [RequestMessage], config: &'a LlmConfig, stream: bool) -> Self {
        Self {
            model: config.model.as_str(),
            messages,
            stream,
            temperature: config.temperature,
            top_p: config.top_p,
            presence_penalty: config.presence_penalty,
            frequency_penalty: config.frequency_penalty,
            max_tokens: config.max_tokens,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: Option<ResponseMessage>,
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkResponse {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Role;

    fn byte_stream(
        parts: Vec<&'static str>,
    ) -> impl Stream<Item = Result<&'static [u8], reqwest::Error>> + Send {
        futures::stream::iter(parts.into_iter().map(|p| Ok(p.as_bytes())))
    }

    #[test]
    fn parse_sse_line_variants() {
        assert!(matches!(parse_sse_line("data: [DONE]\n"), SseLine::Done));
        assert!(matches!(parse_sse_line(": keep-alive"), SseLine::Ignored));
        assert!(matches!(parse_sse_line("event: ping"), SseLine::Ignored));
        assert!(matches!(parse_sse_line("data: {not json"), SseLine::Ignored));
        assert!(matches!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#),
            SseLine::Chunk(_)
        ));
    }

    #[tokio::test]
    async fn sse_events_reassembles_split_lines() {
        let parts = vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choi",
            "ces\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2,\"total_tokens\":5}}\n\n",
            "data: [DONE]\n\n",
        ];
        let events: Vec<_> = sse_events(byte_stream(parts)).collect().await;
        let events: Vec<StreamEvent> = events.into_iter().filter_map(Result::ok).collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Hel".to_string()),
                StreamEvent::Delta("lo".to_string()),
                StreamEvent::Finish {
                    stop_reason: Some(FinishReason::Stop),
                    usage: Some(Usage {
                        prompt_tokens: 3,
                        completion_tokens: 2,
                        total_tokens: 5,
                    }),
                },
            ]
        );
    }

    #[tokio::test]
    async fn sse_events_keep_characters_split_across_chunks() {
        const BODY: &[u8] =
            "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n\ndata: [DONE]\n\n"
                .as_bytes();
        let split = BODY.iter().position(|&b| b == 0xC3).map_or(0, |at| at + 1);
        let parts: Vec<&'static [u8]> = vec![&BODY[..split], &BODY[split..]];
        let stream = futures::stream::iter(parts.into_iter().map(Ok::<_, reqwest::Error>));

        let events: Vec<_> = sse_events(stream).collect().await;
        let events: Vec<StreamEvent> = events.into_iter().filter_map(Result::ok).collect();
        assert_eq!(events[0], StreamEvent::Delta("café".to_string()));
    }

    #[tokio::test]
    async fn sse_events_parse_a_final_line_without_newline() {
        let parts = vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" there\"},\"finish_reason\":\"stop\"}]}",
        ];
        let events: Vec<_> = sse_events(byte_stream(parts)).collect().await;
        let events: Vec<StreamEvent> = events.into_iter().filter_map(Result::ok).collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::Delta("Hi".to_string()),
                StreamEvent::Delta(" there".to_string()),
                StreamEvent::Finish {
                    stop_reason: Some(FinishReason::Stop),
                    usage: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn sse_events_without_text_is_an_error() {
        let parts = vec!["data: [DONE]\n\n"];
        let events: Vec<_> = sse_events(byte_stream(parts)).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn request_body_carries_sampling_options() {
        let messages = vec![RequestMessage::text(Role::User, "hello")];
        let config = LlmConfig::default();
        let body = ChatRequestBody::new(&messages, &config, true);
        let json = serde_json::to_value(&body).unwrap_or_default();

        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["stream"], true);
        assert_eq!(json["stream_options"]["include_usage"], true);
        assert_eq!(json["max_tokens"], 4000);
        assert_eq!(json["messages"][0]["content"], "hello");
    }

    #[test]
    fn client_rejects_invalid_base_url() {
        let config = EndpointConfig {
            base_url: "not a url".to_string(),
            ..EndpointConfig::default()
        };
        assert!(OpenAiClient::new(&config).is_err());
    }
}
