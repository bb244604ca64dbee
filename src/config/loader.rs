// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Read and deserialize a config file without cross-checking sections.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let raw: RawConfigFile = toml::from_str(&text)?;
    debug!(
        path = %path.display(),
        tunnels = raw.tunnel.len(),
        remotes = raw.remote.len(),
        phases = raw.phase.len(),
        "config parsed"
    );
    Ok(raw)
}

/// Read, deserialize and validate a config file.
///
/// Validation rejects phases that reference unknown tunnels or remote
/// commands, duplicate phase names, names shared by a tunnel and a remote
/// command, blank hosts, zero ports and a zero tunnel timeout.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}

/// `Backhaul.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Backhaul.toml")
}
