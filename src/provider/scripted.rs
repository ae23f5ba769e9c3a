//! Providers with a fixed script, for tests.

use super::{ChatChunk, ChatRequest, ChatStream, Provider, StartFuture};
use anyhow::anyhow;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Debug, Clone)]
pub(crate) enum Step {
    Text(&'static str),
    Fail(&'static str),
    /// Yield nothing until the consumer drops the stream.
    Hang,
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedProvider {
    steps: Vec<Step>,
    reject: Option<&'static str>,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<ChatRequest>>,
    /// Set once a hanging script sees its consumer go away.
    pub abandoned: Arc<AtomicBool>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            ..Default::default()
        })
    }

    /// One fragment per element.
    pub fn fragments(parts: &[&'static str]) -> Arc<Self> {
        Self::new(parts.iter().copied().map(Step::Text).collect())
    }

    /// Rejects the request before any stream exists.
    pub fn rejecting(msg: &'static str) -> Arc<Self> {
        Arc::new(Self {
            reject: Some(msg),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Provider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn stream_chat(&self, req: ChatRequest) -> StartFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(req);
        let steps = self.steps.clone();
        let reject = self.reject;
        let abandoned = self.abandoned.clone();

        Box::pin(async move {
            if let Some(msg) = reject {
                return Err(anyhow!(msg));
            }

            let (tx, rx) = mpsc::channel::<anyhow::Result<ChatChunk>>(8);
            tokio::spawn(async move {
                for step in steps {
                    let item = match step {
                        Step::Text(t) => Ok(ChatChunk { text: t.to_string() }),
                        Step::Fail(msg) => Err(anyhow!(msg)),
                        Step::Hang => {
                            tx.closed().await;
                            abandoned.store(true, Ordering::SeqCst);
                            return;
                        }
                    };
                    if tx.send(item).await.is_err() {
                        return;
                    }
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as ChatStream)
        })
    }
}
