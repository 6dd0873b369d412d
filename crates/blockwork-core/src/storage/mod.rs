mod config;

pub use config::{
    AutoUnlockSettings, Config, NotesSettings, PhoneApiSettings, RemoteStateSettings,
    RemoteSyncSettings, RetrySettings, UnlockSettings,
};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Directory for `config.toml` and the local `state.json`, created on demand.
///
/// `~/.config/blockwork`, or `~/.config/blockwork-dev` when `BLOCKWORK_ENV=dev`.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let name = match std::env::var("BLOCKWORK_ENV").as_deref() {
        Ok("dev") => "blockwork-dev",
        _ => "blockwork",
    };
    let home = dirs::home_dir().ok_or_else(|| ConfigError::LoadFailed {
        path: PathBuf::from("~"),
        message: "home directory not found".into(),
    })?;
    let dir = home.join(".config").join(name);
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::SaveFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
