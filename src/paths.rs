use anyhow::Context;
use std::env;
use std::path::PathBuf;

/// Directory holding `config.toml`.
///
/// `$CARDCHAT_HOME/config`, else `$XDG_CONFIG_HOME/cardchat`, else
/// `~/.config/cardchat`. Nothing is created.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    resolve_config_dir(
        env::var_os("CARDCHAT_HOME").map(PathBuf::from),
        env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        env::var_os("HOME").map(PathBuf::from),
    )
    .context("HOME is not set")
}

pub fn config_file() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

fn resolve_config_dir(base: Option<PathBuf>, xdg: Option<PathBuf>, home: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(base) = base {
        return Some(base.join("config"));
    }
    if let Some(xdg) = xdg {
        return Some(xdg.join("cardchat"));
    }
    home.map(|h| h.join(".config").join("cardchat"))
}
