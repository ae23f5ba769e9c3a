mod adapter;
mod app;
mod cli;
mod config;
mod conversation;
mod error;
mod paths;
mod provider;
mod server;
mod templates;

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = cli::Args::parse();

    let config_path = match &args.config {
        Some(p) => p.clone(),
        None => paths::config_file()?,
    };
    let cfg = config::Config::load_optional(&config_path)?;
    tracing::debug!(?config_path, ?cfg, "resolved config");

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let listen = match &args.cmd {
        Some(cli::Command::Serve { listen }) => listen.clone(),
        _ => None,
    };
    let settings = app::Settings::resolve(&args, cfg.as_ref(), listen)?;
    let source = app::EnvProviderSource::new(http, settings.kind, cfg.as_ref());

    if let Some(cli::Command::Ask { prompt }) = args.cmd {
        let mut out = std::io::stdout();
        return app::cmd_ask(&source, &settings.options, prompt.join(" "), &mut out).await;
    }

    let addr: SocketAddr = settings
        .listen
        .parse()
        .with_context(|| format!("invalid listen address: {}", settings.listen))?;

    let state = server::AppState {
        providers: Arc::new(source),
        options: settings.options.clone(),
    };
    let router = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        provider = ?settings.kind,
        model = %settings.options.model,
        strict = settings.options.strict,
        "cardchat listening"
    );

    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
