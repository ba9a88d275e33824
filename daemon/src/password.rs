//! API password discovery: explicit value, then `SIA_API_PASSWORD`, then the
//! `apipassword` file in the Sia data directory

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const PASSWORD_ENV: &str = "SIA_API_PASSWORD";
pub const DATA_DIR_ENV: &str = "SIA_DATA_DIR";
const PASSWORD_FILE: &str = "apipassword";

/// Where the Sia daemon keeps its data, honouring `SIA_DATA_DIR`
pub fn sia_dir(data_dir_env: Option<String>) -> Option<PathBuf> {
    if let Some(dir) = data_dir_env.filter(|dir| !dir.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    default_sia_dir()
}

fn default_sia_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        dirs::data_local_dir().map(|dir| dir.join("Sia"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir().map(|dir| dir.join("Sia"))
    } else {
        dirs::home_dir().map(|dir| dir.join(".sia"))
    }
}

/// Resolve the password in priority order. A missing password file only
/// warns: the daemon may have authentication disabled.
pub fn resolve_api_password(
    explicit: Option<&str>,
    env_value: Option<String>,
    sia_dir: Option<&Path>,
) -> Result<Option<String>> {
    if let Some(password) = explicit.filter(|p| !p.is_empty()) {
        debug!("Using API password from configuration");
        return Ok(Some(password.to_string()));
    }

    if let Some(password) = env_value.filter(|p| !p.is_empty()) {
        debug!("Using API password from {}", PASSWORD_ENV);
        return Ok(Some(password));
    }

    let Some(dir) = sia_dir else {
        warn!("Could not determine the Sia data directory, continuing without an API password");
        return Ok(None);
    };

    let file = dir.join(PASSWORD_FILE);
    match std::fs::read_to_string(&file) {
        Ok(contents) => {
            debug!(path = %file.display(), "Using API password file");
            Ok(Some(contents.trim().to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %file.display(), "No API password file, continuing without a password");
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", file.display())),
    }
}
