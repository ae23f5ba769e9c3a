use super::{ChatChunk, ChatRequest, ChatStream, Provider, StartFuture};
use crate::conversation::Role;
use crate::templates::TemplateName;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Offline provider that answers with a canned card.
///
/// The card is chosen from keywords in the latest user message and dripped
/// out in small fragments, like a real completion stream.
#[derive(Debug, Clone)]
pub struct StubProvider {
    delay: Duration,
    fragment_len: usize,
}

impl Default for StubProvider {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(20),
            fragment_len: 16,
        }
    }
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl Provider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn stream_chat(&self, req: ChatRequest) -> StartFuture {
        let this = self.clone();

        Box::pin(async move {
            let prompt = req
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.to_lowercase())
                .unwrap_or_default();
            let reply = canned_reply(pick_template(&prompt), &req.model);

            let (tx, rx) = mpsc::channel::<anyhow::Result<ChatChunk>>(32);

            tokio::spawn(async move {
                let chars: Vec<char> = reply.chars().collect();
                for piece in chars.chunks(this.fragment_len.max(1)) {
                    tokio::time::sleep(this.delay).await;
                    let text: String = piece.iter().collect();
                    if tx.send(Ok(ChatChunk { text })).await.is_err() {
                        break;
                    }
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as ChatStream)
        })
    }
}

fn pick_template(prompt: &str) -> TemplateName {
    const CHART_WORDS: [&str; 5] = ["chart", "graph", "plot", "trend over", "visuali"];
    const ACTION_WORDS: [&str; 5] = ["action", "button", "confirm", "delete", "should i"];

    if CHART_WORDS.iter().any(|w| prompt.contains(w)) {
        TemplateName::Chart
    } else if ACTION_WORDS.iter().any(|w| prompt.contains(w)) {
        TemplateName::Action
    } else {
        TemplateName::Dashboard
    }
}

fn canned_reply(name: TemplateName, model: &str) -> String {
    let data = match name {
        TemplateName::Dashboard => serde_json::json!({
            "title": "Service overview",
            "metrics": [
                {"label": "Requests", "value": "12.4k", "trend": "up", "change": "+8%"},
                {"label": "Error rate", "value": "0.3%", "trend": "down", "change": "-0.1%"},
                {"label": "Model", "value": model, "trend": "neutral"}
            ],
            "lastUpdated": "just now"
        }),
        TemplateName::Chart => serde_json::json!({
            "title": "Quarterly sales",
            "type": "bar",
            "data": [
                {"label": "Q1", "value": 10},
                {"label": "Q2", "value": 20},
                {"label": "Q3", "value": 15},
                {"label": "Q4", "value": 25}
            ],
            "unit": "k$"
        }),
        TemplateName::Action => serde_json::json!({
            "title": "Deploy release",
            "description": "Version 1.4.0 passed all checks.",
            "actions": [
                {"label": "Deploy", "type": "primary", "action": "deploy"},
                {"label": "Schedule", "type": "secondary", "action": "schedule"},
                {"label": "Discard", "type": "danger", "action": "discard"}
            ]
        }),
    };
    serde_json::json!({ "template": name, "data": data }).to_string()
}
