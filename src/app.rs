use crate::adapter::{self, AdapterOptions};
use crate::conversation::{ConversationMessage, Role};
use crate::error::ChatError;
use crate::provider::{self, Provider};
use crate::server::ProviderSource;
use crate::{cli, config};
use anyhow::Context;
use std::io::Write;
use std::sync::Arc;
use tokio_stream::StreamExt;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Google,
    Stub,
}

impl ProviderKind {
    pub fn parse(name: &str) -> anyhow::Result<Self> {
        match name {
            "openai" => Ok(Self::OpenAi),
            "google" => Ok(Self::Google),
            "stub" => Ok(Self::Stub),
            other => anyhow::bail!("unknown provider: {other}"),
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Google => "gemini-1.5-flash",
            Self::Stub => "stub",
        }
    }
}

/// Settings resolved from flags, config file and defaults, in that order.
#[derive(Debug, Clone)]
pub struct Settings {
    pub kind: ProviderKind,
    pub options: AdapterOptions,
    pub listen: String,
}

impl Settings {
    pub fn resolve(args: &cli::Args, cfg: Option<&config::Config>, listen: Option<String>) -> anyhow::Result<Self> {
        let provider_name = args
            .provider
            .clone()
            .or_else(|| cfg.and_then(|c| c.provider.clone()))
            .unwrap_or_else(|| "openai".to_string());
        let kind = ProviderKind::parse(&provider_name)?;

        let model = args
            .model
            .clone()
            .or_else(|| cfg.and_then(|c| c.model.clone()))
            .unwrap_or_else(|| kind.default_model().to_string());

        let strict = !args.lenient && cfg.and_then(|c| c.strict_templates).unwrap_or(true);

        let listen = listen
            .or_else(|| cfg.and_then(|c| c.listen.clone()))
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());

        Ok(Self {
            kind,
            options: AdapterOptions { model, strict },
            listen,
        })
    }
}

/// Builds a provider per request from the environment and config file.
pub struct EnvProviderSource {
    http: reqwest::Client,
    kind: ProviderKind,
    cfg: config::Config,
    env: fn(&str) -> Option<String>,
}

impl EnvProviderSource {
    pub fn new(http: reqwest::Client, kind: ProviderKind, cfg: Option<&config::Config>) -> Self {
        Self {
            http,
            kind,
            cfg: cfg.cloned().unwrap_or_default(),
            env: |var| std::env::var(var).ok(),
        }
    }

    /// Replace the environment lookup.
    #[cfg(test)]
    fn with_env(mut self, env: fn(&str) -> Option<String>) -> Self {
        self.env = env;
        self
    }

    fn api_key(&self, var: &str, fallback: Option<&String>) -> Option<String> {
        let present = |k: &String| !k.trim().is_empty();
        (self.env)(var)
            .filter(present)
            .or_else(|| fallback.filter(|k| present(*k)).cloned())
    }
}

impl ProviderSource for EnvProviderSource {
    fn provider(&self) -> Result<Arc<dyn Provider>, ChatError> {
        match self.kind {
            ProviderKind::OpenAi => {
                #[cfg(feature = "openai")]
                {
                    let key = self.api_key("OPENAI_API_KEY", self.cfg.openai.api_key.as_ref())
                        .ok_or(ChatError::MissingCredential { provider: "OpenAI" })?;
                    let p = provider::openai::OpenAiProvider::new(
                        self.http.clone(),
                        key,
                        self.cfg.openai.base_url.as_deref(),
                    )
                    .map_err(ChatError::Provider)?;
                    Ok(Arc::new(p))
                }
                #[cfg(not(feature = "openai"))]
                {
                    Err(ChatError::Provider(anyhow::anyhow!(
                        "openai provider is not enabled in this build"
                    )))
                }
            }
            ProviderKind::Google => {
                #[cfg(feature = "google")]
                {
                    let key = self.api_key("GEMINI_API_KEY", self.cfg.google.api_key.as_ref())
                        .ok_or(ChatError::MissingCredential { provider: "Gemini" })?;
                    let p = provider::google::GoogleProvider::new(self.http.clone(), key)
                        .map_err(ChatError::Provider)?;
                    Ok(Arc::new(p))
                }
                #[cfg(not(feature = "google"))]
                {
                    Err(ChatError::Provider(anyhow::anyhow!(
                        "google provider is not enabled in this build"
                    )))
                }
            }
            ProviderKind::Stub => Ok(Arc::new(provider::stub::StubProvider::new())),
        }
    }
}

/// Run one prompt through the adapter and write the SSE frames to `out`.
pub async fn cmd_ask(
    source: &dyn ProviderSource,
    options: &AdapterOptions,
    prompt: String,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let provider = source.provider()?;
    let messages = vec![ConversationMessage {
        role: Role::User,
        content: prompt,
    }];

    let mut events = adapter::respond(provider.as_ref(), messages, options)
        .await
        .context("provider failed to start streaming")?;

    while let Some(item) = events.next().await {
        let event = item.context("event stream aborted")?;
        out.write_all(event.encode()?.as_bytes())?;
        out.flush().ok();
    }
    Ok(())
}
