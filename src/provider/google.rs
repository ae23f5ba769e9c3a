use super::sse::SseParser;
use super::{ChatChunk, ChatRequest, ChatStream, Provider, StartFuture};
use crate::conversation::Role;
use anyhow::{anyhow, Context};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

#[derive(Debug, Clone)]
pub struct GoogleProvider {
    http: reqwest::Client,
    api_key: String,
    api_base: Url,
}

impl GoogleProvider {
    pub fn new(http: reqwest::Client, api_key: String) -> anyhow::Result<Self> {
        Ok(Self {
            http,
            api_key,
            api_base: Url::parse("https://generativelanguage.googleapis.com/")?,
        })
    }

    #[cfg(test)]
    fn with_base(mut self, base: &str) -> anyhow::Result<Self> {
        self.api_base = Url::parse(base)?;
        Ok(self)
    }

    fn build_url(&self, model: &str) -> anyhow::Result<Url> {
        // streamGenerateContent speaks SSE when alt=sse is set.
        let mut url = self
            .api_base
            .join(&format!("v1beta/models/{model}:streamGenerateContent"))?;
        url.query_pairs_mut().append_pair("alt", "sse");
        Ok(url)
    }

    /// The key travels in a header so it never shows up in a URL.
    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(&self.api_key).map_err(|e| anyhow!(e))?;
        key.set_sensitive(true);
        h.insert(HeaderName::from_static("x-goog-api-key"), key);
        Ok(h)
    }
}

impl Provider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn stream_chat(&self, req: ChatRequest) -> StartFuture {
        let this = self.clone();

        Box::pin(async move {
            let url = this.build_url(&req.model)?;
            let headers = this.headers()?;
            let body = GenerateRequest::from_chat(&req);

            let resp = this
                .http
                .post(url)
                .headers(headers)
                .json(&body)
                .send()
                .await
                .map_err(reqwest::Error::without_url)
                .context("failed to start Gemini request")?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(anyhow!("Gemini API error: HTTP {status}: {text}"));
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
                        let data = match ev {
                            Ok(d) => d,
                            Err(e) => {
                                let _ = tx.send(Err(e)).await;
                                return;
                            }
                        };
                        // Gemini frames are always JSON; there is no [DONE] sentinel.
                        if data.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<GenerateResponse>(&data) {
                            Ok(r) => {
                                if let Some(text) = extract_text(&r) {
                                    if tx.send(Ok(ChatChunk { text })).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Err(e) => {
                                let _ = tx
                                    .send(Err(anyhow!(e).context("failed to parse SSE JSON")))
                                    .await;
                                return;
                            }
                        }
                    }
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as ChatStream)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateRequest {
    fn from_chat(req: &ChatRequest) -> Self {
        let contents = req
            .messages
            .iter()
            .map(|m| Content {
                role: Some(
                    match m.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();

        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: Some(req.system.clone()),
                }],
            },
            contents,
            generation_config: req.json_output.then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

fn extract_text(r: &GenerateResponse) -> Option<String> {
    // Concatenate all text parts of the first candidate.
    let content = r.candidates.first()?.content.as_ref()?;
    let out: String = content.parts.iter().filter_map(|p| p.text.as_deref()).collect();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationMessage;
    use axum::response::IntoResponse;

    #[test]
    fn maps_roles_and_instruction() {
        let req = ChatRequest {
            model: "gemini-1.5-flash".into(),
            system: "sys".into(),
            messages: vec![
                ConversationMessage { role: Role::User, content: "q".into() },
                ConversationMessage { role: Role::Assistant, content: "a".into() },
            ],
            json_output: true,
        };
        let body = serde_json::to_value(GenerateRequest::from_chat(&req)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "systemInstruction": {"parts": [{"text": "sys"}]},
                "contents": [
                    {"role": "user", "parts": [{"text": "q"}]},
                    {"role": "model", "parts": [{"text": "a"}]}
                ],
                "generationConfig": {"responseMimeType": "application/json"}
            })
        );
    }

    #[test]
    fn extracts_first_candidate_text() {
        let r: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"a\""},{"text":":1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(&r).as_deref(), Some("{\"a\":1}"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(extract_text(&empty), None);
    }

    #[test]
    fn key_goes_in_header_not_url() {
        let p = GoogleProvider::new(reqwest::Client::new(), "abc".into()).unwrap();
        let url = p.build_url("gemini-1.5-flash").unwrap();
        assert_eq!(url.path(), "/v1beta/models/gemini-1.5-flash:streamGenerateContent");
        assert_eq!(url.query(), Some("alt=sse"));

        let headers = p.headers().unwrap();
        assert_eq!(headers["x-goog-api-key"], "abc");
        assert!(headers["x-goog-api-key"].is_sensitive());
    }

    #[tokio::test]
    async fn connect_error_does_not_expose_key() {
        let p = GoogleProvider::new(reqwest::Client::new(), "SECRET-KEY-123".into())
            .unwrap()
            .with_base("http://127.0.0.1:1/")
            .unwrap();
        let req = ChatRequest {
            model: "m".into(),
            system: "sys".into(),
            messages: vec![ConversationMessage { role: Role::User, content: "q".into() }],
            json_output: true,
        };
        let Err(err) = p.stream_chat(req).await else {
            panic!("expected a connect failure");
        };
        let shown = format!("{err:#}");
        assert!(shown.contains("failed to start Gemini request"), "{shown}");
        assert!(!shown.contains("SECRET-KEY-123"), "{shown}");

        let resp = crate::error::ChatError::Provider(err).into_response();
        assert_eq!(resp.status(), axum::http::StatusCode::BAD_GATEWAY);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("upstream request failed"), "{body}");
        assert!(!body.contains("SECRET-KEY-123"), "{body}");
    }
}
