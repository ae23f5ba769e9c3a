use super::sse::SseParser;
use super::{ChatChunk, ChatRequest, ChatStream, Provider, StartFuture};
use anyhow::{anyhow, Context};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/";

/// Any server speaking the OpenAI chat completions wire format.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    api_base: Url,
}

impl OpenAiProvider {
    pub fn new(http: reqwest::Client, api_key: String, base_url: Option<&str>) -> anyhow::Result<Self> {
        let mut base = base_url.unwrap_or(DEFAULT_BASE_URL).to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let api_base = Url::parse(&base).with_context(|| format!("invalid OpenAI base URL: {base}"))?;
        Ok(Self { http, api_key, api_base })
    }

    fn build_url(&self) -> anyhow::Result<Url> {
        Ok(self.api_base.join("v1/chat/completions")?)
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let v = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|e| anyhow!(e))?;
        h.insert(AUTHORIZATION, v);
        Ok(h)
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn stream_chat(&self, req: ChatRequest) -> StartFuture {
        let this = self.clone();

        Box::pin(async move {
            let url = this.build_url()?;
            let headers = this.headers()?;
            let body = CompletionRequest::from_chat(&req);

            let resp = this
                .http
                .post(url)
                .headers(headers)
                .json(&body)
                .send()
                .await
                .map_err(reqwest::Error::without_url)
                .context("failed to start OpenAI request")?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(anyhow!("OpenAI API error: HTTP {status}: {text}"));
            }

            let (tx, rx) = mpsc::channel::<anyhow::Result<ChatChunk>>(64);

            tokio::spawn(async move {
                let mut stream = resp.bytes_stream();
                let mut parser = SseParser::new();

                while let Some(item) = stream.next().await {
                    let bytes = match item {
                        Ok(b) => b,
                        Err(e) => {
                            let e = anyhow!(e.without_url()).context("network stream error");
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    };

                    for ev in parser.push(&bytes) {
                        match ev.and_then(|data| decode_event(&data)) {
                            Ok(Decoded::Text(text)) => {
                                if tx.send(Ok(ChatChunk { text })).await.is_err() {
                                    return;
                                }
                            }
                            Ok(Decoded::Skip) => {}
                            Ok(Decoded::Done) => return,
                            Err(e) => {
                                let _ = tx.send(Err(e)).await;
                                return;
                            }
                        }
                    }
                }

                if let Some(data) = parser.finish() {
                    match decode_event(&data) {
                        Ok(Decoded::Text(text)) => {
                            let _ = tx.send(Ok(ChatChunk { text })).await;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                        }
                    }
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as ChatStream)
        })
    }
}

#[derive(Debug, PartialEq)]
enum Decoded {
    Text(String),
    Skip,
    Done,
}

fn decode_event(data: &str) -> anyhow::Result<Decoded> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(Decoded::Skip);
    }
    if data == "[DONE]" {
        return Ok(Decoded::Done);
    }

    let chunk: CompletionChunk = serde_json::from_str(data).context("failed to parse SSE JSON")?;
    if let Some(err) = chunk.error {
        return Err(anyhow!("OpenAI stream error: {}", err.message));
    }

    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();
    if text.is_empty() {
        Ok(Decoded::Skip)
    } else {
        Ok(Decoded::Text(text))
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

impl<'a> CompletionRequest<'a> {
    fn from_chat(req: &'a ChatRequest) -> Self {
        let mut messages = Vec::with_capacity(req.messages.len() + 1);
        messages.push(WireMessage {
            role: "system",
            content: &req.system,
        });
        messages.extend(req.messages.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        Self {
            model: &req.model,
            messages,
            stream: true,
            response_format: req.json_output.then(|| ResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}
