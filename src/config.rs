use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Provider identifier: "openai", "google" or "stub".
    pub provider: Option<String>,

    /// Default model (optional; each provider has its own default).
    pub model: Option<String>,

    /// Address to serve on, e.g. "127.0.0.1:3000".
    pub listen: Option<String>,

    /// Validate template data against its declared shape (default: true).
    pub strict_templates: Option<bool>,

    pub openai: OpenAiConfig,
    pub google: GoogleConfig,
}

#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Used when OPENAI_API_KEY is unset.
    pub api_key: Option<String>,

    /// OpenAI-compatible server root (default: https://api.openai.com/).
    pub base_url: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GoogleConfig {
    /// Used when GEMINI_API_KEY is unset.
    pub api_key: Option<String>,
}

fn redacted(key: &Option<String>) -> &'static str {
    if key.is_some() {
        "<set>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("api_key", &redacted(&self.api_key))
            .finish()
    }
}

impl Config {
    /// Load config if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to read config: {}", path.display()))
            }
        };

        let s = String::from_utf8(bytes).context("config is not valid UTF-8")?;
        let cfg: Config = toml::from_str(&s)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
        Ok(Some(cfg))
    }
}
