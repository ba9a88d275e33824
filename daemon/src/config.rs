use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use siasync_core::api::{DEFAULT_ADDRESS, DEFAULT_USER_AGENT};
use siasync_core::{Redundancy, RemotePath};
use siasync_engine::filter::parse_extension_list;
use siasync_engine::sync_engine::{DEFAULT_PREFIX, DEFAULT_RETRY_BACKOFF};
use siasync_engine::{FilterOptions, FingerprintMode, HashAlgorithm, ReconcileStages, SyncOptions};

/// File-backed configuration; every section is optional in the TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiaSyncConfig {
    pub renter: RenterSettings,
    pub sync: SyncSettings,
    pub log: LogSettings,
    pub state: StateSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenterSettings {
    /// host:port of the Sia daemon API
    pub address: String,
    pub agent: String,
    /// API password; discovered from the environment or the Sia data dir when unset
    pub password: Option<String>,
    /// Overrides `SIA_DATA_DIR` and the platform default
    pub sia_dir: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Remote folder the directory is mirrored into
    pub subfolder: String,
    pub archive: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub data_pieces: u64,
    pub parity_pieces: u64,
    pub size_only: bool,
    pub hash: HashAlgorithm,
    pub sync_only: bool,
    pub dry_run: bool,
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// trace, debug, info, warn or error
    pub level: String,
    pub json: bool,
    /// Also write JSON logs to this file
    pub file: Option<PathBuf>,
    /// daily, hourly or never
    pub rotation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    /// Persist remote identifiers across restarts
    pub persist: bool,
    pub file: Option<PathBuf>,
}

impl Default for RenterSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            agent: DEFAULT_USER_AGENT.to_string(),
            password: None,
            sia_dir: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        let redundancy = Redundancy::default();
        Self {
            subfolder: DEFAULT_PREFIX.to_string(),
            archive: false,
            include: Vec::new(),
            exclude: Vec::new(),
            data_pieces: redundancy.data_pieces,
            parity_pieces: redundancy.parity_pieces,
            size_only: false,
            hash: HashAlgorithm::default(),
            sync_only: false,
            dry_run: false,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
            rotation: "daily".to_string(),
        }
    }
}

impl SiaSyncConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: SiaSyncConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self, directory: &Path) -> Result<()> {
        if !directory.is_dir() {
            anyhow::bail!("Sync directory does not exist or is not a directory: {}", directory.display());
        }
        if self.sync.data_pieces == 0 {
            anyhow::bail!("data-pieces must be at least 1");
        }
        if self.renter.address.trim().is_empty() {
            anyhow::bail!("Renter address cannot be empty");
        }
        RemotePath::new(&self.sync.subfolder)
            .with_context(|| format!("Invalid subfolder '{}'", self.sync.subfolder))?;
        match self.log.rotation.as_str() {
            "daily" | "hourly" | "never" => {}
            other => anyhow::bail!("Unknown log rotation '{}'", other),
        }
        Ok(())
    }

    /// Engine options for this configuration
    pub fn sync_options(&self) -> Result<SyncOptions> {
        let prefix = RemotePath::new(&self.sync.subfolder)
            .with_context(|| format!("Invalid subfolder '{}'", self.sync.subfolder))?;

        let fingerprint_mode = if self.sync.size_only {
            FingerprintMode::Size
        } else {
            FingerprintMode::Content(self.sync.hash)
        };

        Ok(SyncOptions {
            prefix,
            archive: self.sync.archive,
            dry_run: self.sync.dry_run,
            sync_only: self.sync.sync_only,
            fingerprint_mode,
            stages: ReconcileStages {
                upload_missing: true,
                remove_orphaned: !self.sync.archive,
                update_changed: true,
            },
            redundancy: Redundancy {
                data_pieces: self.sync.data_pieces,
                parity_pieces: self.sync.parity_pieces,
            },
            retry_backoff: self.sync.retry_backoff,
            filter: FilterOptions {
                include_extensions: join_lists(&self.sync.include),
                exclude_extensions: join_lists(&self.sync.exclude),
            },
            persistence_file: self.persistence_file(),
        })
    }

    fn persistence_file(&self) -> Option<PathBuf> {
        if !self.state.persist {
            return None;
        }
        self.state.file.clone().or_else(default_state_file)
    }
}

/// Entries may themselves be comma separated, as on the command line
fn join_lists(items: &[String]) -> std::collections::BTreeSet<String> {
    items
        .iter()
        .flat_map(|item| parse_extension_list(item))
        .collect()
}

fn default_state_file() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("siasync").join("persist.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let config = SiaSyncConfig::default();
        assert_eq!(config.renter.address, "127.0.0.1:9980");
        assert_eq!(config.renter.agent, "Sia-Agent");
        assert_eq!(config.sync.subfolder, "siasync");
        assert_eq!(config.sync.data_pieces, 10);
        assert_eq!(config.sync.parity_pieces, 30);
        assert_eq!(config.sync.retry_backoff, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("siasync.toml");
        tokio::fs::write(
            &path,
            r#"
[sync]
subfolder = "backups/laptop"
archive = true
exclude = ["tmp,log"]
retry_backoff = "2s"

[log]
json = true
"#,
        )
        .await
        .unwrap();

        let config = SiaSyncConfig::load(&path).await.unwrap();
        assert_eq!(config.renter, RenterSettings::default());
        assert_eq!(config.sync.subfolder, "backups/laptop");
        assert_eq!(config.sync.retry_backoff, Duration::from_secs(2));
        assert!(config.log.json);

        let options = config.sync_options().unwrap();
        assert!(options.archive);
        assert!(!options.stages.remove_orphaned);
        assert_eq!(options.prefix.as_str(), "backups/laptop");
        assert_eq!(options.filter.exclude_extensions.len(), 2);
    }

    #[test]
    fn test_size_only_selects_size_mode() {
        let mut config = SiaSyncConfig::default();
        config.sync.size_only = true;
        let options = config.sync_options().unwrap();
        assert_eq!(options.fingerprint_mode, FingerprintMode::Size);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let dir = TempDir::new().unwrap();

        let mut config = SiaSyncConfig::default();
        assert!(config.validate(dir.path()).is_ok());
        assert!(config.validate(&dir.path().join("missing")).is_err());

        config.sync.data_pieces = 0;
        assert!(config.validate(dir.path()).is_err());

        let mut config = SiaSyncConfig::default();
        config.sync.subfolder = "a//b".to_string();
        assert!(config.validate(dir.path()).is_err());
    }

    #[test]
    fn test_persistence_is_opt_in() {
        let mut config = SiaSyncConfig::default();
        assert!(config.sync_options().unwrap().persistence_file.is_none());

        config.state.persist = true;
        config.state.file = Some(PathBuf::from("/tmp/state.json"));
        assert_eq!(
            config.sync_options().unwrap().persistence_file,
            Some(PathBuf::from("/tmp/state.json"))
        );
    }
}
