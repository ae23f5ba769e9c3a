//! Streaming response adapter.
//!
//! Forwards a conversation to a completion provider, buffers the whole
//! answer, and turns it into a short, fixed sequence of protocol events:
//! `tpl` + `tpl_props_chunk` when the answer is a template card, a single
//! `text` otherwise, and always a closing `[DONE]`.

use crate::conversation::ConversationMessage;
use crate::error::ChatError;
use crate::provider::{ChatRequest, ChatStream, Provider};
use crate::templates::{self, TemplateName, TemplatePayload};
use axum::response::sse::Event;
use futures_core::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub model: String,

    /// Only emit `tpl` when `data` matches the declared template's shape.
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    Template { name: TemplateName, props: Value },
    TemplatePropsChunk { chunk: String },
    Text { chunk: String },
    Done,
}

pub type EventStream = BoxStream<'static, Result<ProtocolEvent, ChatError>>;

#[derive(Serialize)]
#[serde(tag = "type")]
enum WireEvent<'a> {
    #[serde(rename = "tpl")]
    Tpl {
        name: TemplateName,
        #[serde(rename = "templateProps")]
        template_props: &'a Value,
    },
    #[serde(rename = "tpl_props_chunk")]
    TplPropsChunk { chunk: &'a str },
    #[serde(rename = "text")]
    Text { chunk: &'a str },
}

impl ProtocolEvent {
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            ProtocolEvent::Template { .. } => Some("tpl"),
            ProtocolEvent::TemplatePropsChunk { .. } => Some("tpl_props_chunk"),
            ProtocolEvent::Text { .. } => Some("text"),
            ProtocolEvent::Done => None,
        }
    }

    /// Payload of the `data:` line.
    pub fn data(&self) -> Result<String, ChatError> {
        let wire = match self {
            ProtocolEvent::Template { name, props } => WireEvent::Tpl {
                name: *name,
                template_props: props,
            },
            ProtocolEvent::TemplatePropsChunk { chunk } => WireEvent::TplPropsChunk { chunk },
            ProtocolEvent::Text { chunk } => WireEvent::Text { chunk },
            ProtocolEvent::Done => return Ok(DONE_MARKER.to_string()),
        };
        serde_json::to_string(&wire).map_err(|e| ChatError::Channel(format!("failed to encode event: {e}")))
    }

    pub fn to_sse(&self) -> Result<Event, ChatError> {
        let event = Event::default().data(self.data()?);
        Ok(match self.event_name() {
            Some(name) => event.event(name),
            None => event,
        })
    }

    /// Raw `text/event-stream` frame, blank line included.
    pub fn encode(&self) -> Result<String, ChatError> {
        let data = self.data()?;
        Ok(match self.event_name() {
            Some(name) => format!("event: {name}\ndata: {data}\n\n"),
            None => format!("data: {data}\n\n"),
        })
    }
}

/// Start a completion and return the events it will produce.
///
/// Fails only if the provider rejects the request; later failures arrive
/// as an `Err` item that ends the stream without a `Done`.
pub async fn respond(
    provider: &dyn Provider,
    messages: Vec<ConversationMessage>,
    opts: &AdapterOptions,
) -> Result<EventStream, ChatError> {
    let req = ChatRequest {
        model: opts.model.clone(),
        system: templates::system_instruction(),
        messages,
        json_output: true,
    };
    tracing::debug!(
        provider = provider.name(),
        model = %req.model,
        messages = req.messages.len(),
        "starting completion"
    );

    let upstream = provider.stream_chat(req).await.map_err(ChatError::Provider)?;

    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(pump(upstream, tx, opts.strict));
    Ok(Box::pin(ReceiverStream::new(rx)))
}

async fn pump(
    mut upstream: ChatStream,
    tx: mpsc::Sender<Result<ProtocolEvent, ChatError>>,
    strict: bool,
) {
    let mut buffer = String::new();

    loop {
        let item = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!(buffered = buffer.len(), "client went away, dropping completion");
                return;
            }
            item = upstream.next() => item,
        };

        match item {
            Some(Ok(chunk)) => buffer.push_str(&chunk.text),
            Some(Err(e)) => {
                tracing::error!(error = %format!("{e:#}"), "completion stream failed");
                let _ = tx.send(Err(ChatError::Provider(e))).await;
                return;
            }
            None => break,
        }
    }

    for event in finish(&buffer, strict) {
        if tx.send(Ok(event)).await.is_err() {
            tracing::debug!("client went away before the response was sent");
            return;
        }
    }
}

/// Why a finished answer goes out as plain text.
#[derive(Debug, thiserror::Error)]
pub enum Fallback {
    #[error("not valid JSON: {0}")]
    NotJson(serde_json::Error),

    #[error("missing template/data envelope: {0}")]
    NotEnvelope(serde_json::Error),

    #[error("unknown template {0:?}")]
    UnknownTemplate(String),

    #[error("data does not fit the {name} template: {source}")]
    Shape {
        name: TemplateName,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct Envelope {
    template: String,
    data: Value,
}

/// Classify a complete answer as a template card.
pub fn classify(buffer: &str, strict: bool) -> Result<(TemplateName, Value), Fallback> {
    let value: Value = serde_json::from_str(buffer).map_err(Fallback::NotJson)?;
    let envelope: Envelope = serde_json::from_value(value).map_err(Fallback::NotEnvelope)?;
    let name = TemplateName::parse(&envelope.template)
        .ok_or_else(|| Fallback::UnknownTemplate(envelope.template.clone()))?;

    if !strict {
        return Ok((name, envelope.data));
    }

    let props = TemplatePayload::from_value(name, envelope.data)
        .and_then(|payload| {
            tracing::debug!(template = %payload.name(), "answer matches template shape");
            payload.to_value()
        })
        .map_err(|source| Fallback::Shape { name, source })?;
    Ok((name, props))
}

/// Events for a complete answer, `Done` last.
pub fn finish(buffer: &str, strict: bool) -> Vec<ProtocolEvent> {
    let mut events = match classify(buffer, strict) {
        Ok((name, props)) => {
            let chunk = props.to_string();
            vec![
                ProtocolEvent::Template { name, props },
                ProtocolEvent::TemplatePropsChunk { chunk },
            ]
        }
        Err(reason) => {
            tracing::warn!(%reason, len = buffer.len(), "answer is not a template card, sending as text");
            vec![ProtocolEvent::Text {
                chunk: buffer.to_string(),
            }]
        }
    };
    events.push(ProtocolEvent::Done);
    events
}
