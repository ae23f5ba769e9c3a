use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Chat backend that answers with UI card templates
#[derive(Debug, Parser)]
#[command(name = "cardchat")]
#[command(version)]
#[command(about = "Chat backend that answers with UI card templates", long_about = None)]
pub struct Args {
    /// Config file (default: <config dir>/config.toml)
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Provider: openai, google or stub (default: config/provider or "openai")
    #[arg(long = "provider", global = true)]
    pub provider: Option<String>,

    /// Model name
    #[arg(short = 'm', long = "model", global = true)]
    pub model: Option<String>,

    /// Forward any JSON data under a known template name without checking its shape
    #[arg(long = "lenient", global = true)]
    pub lenient: bool,

    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the chat API (default)
    Serve {
        /// Listen address (default: config/listen or 127.0.0.1:3000)
        #[arg(long = "listen", value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Send one message and print the resulting event stream
    Ask {
        /// Prompt text
        #[arg(value_name = "PROMPT", required = true)]
        prompt: Vec<String>,
    },
}
