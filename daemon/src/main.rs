use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

mod config;
mod password;
mod telemetry;

use config::SiaSyncConfig;
use siasync_core::{RemoteStore, RenterClientBuilder};
use siasync_engine::watcher::DEFAULT_EVENT_CAPACITY;
use siasync_engine::{ChangeWatcher, NotifyBackend, PassReport, SyncFolder, TracingSink};

#[derive(Parser, Debug)]
#[command(name = "siasync")]
#[command(about = "Keeps a local directory mirrored onto Sia storage")]
#[command(version)]
struct Cli {
    /// Directory to mirror
    directory: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sia daemon API address (host:port)
    #[arg(short, long)]
    address: Option<String>,

    /// Sia daemon API password
    #[arg(long)]
    password: Option<String>,

    /// User agent sent to the Sia daemon
    #[arg(long)]
    agent: Option<String>,

    /// Remote folder the directory is mirrored into
    #[arg(long)]
    subfolder: Option<String>,

    /// Never delete remote files
    #[arg(long)]
    archive: bool,

    /// Comma-separated extensions to upload; all others are ignored
    #[arg(long)]
    include: Option<String>,

    /// Comma-separated extensions to ignore
    #[arg(long)]
    exclude: Option<String>,

    #[arg(long)]
    data_pieces: Option<u64>,

    #[arg(long)]
    parity_pieces: Option<u64>,

    /// Compare files by size instead of content
    #[arg(long)]
    size_only: bool,

    /// Reconcile once and exit instead of watching
    #[arg(long)]
    sync_only: bool,

    /// Log what would change without touching remote storage
    #[arg(long)]
    dry_run: bool,

    /// Remember remote identifiers across restarts
    #[arg(long)]
    persist: bool,

    /// State file used with --persist
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Flags win over file values; boolean flags can only switch a setting on
    fn apply(&self, config: &mut SiaSyncConfig) {
        if let Some(address) = &self.address {
            config.renter.address = address.clone();
        }
        if let Some(password) = &self.password {
            config.renter.password = Some(password.clone());
        }
        if let Some(agent) = &self.agent {
            config.renter.agent = agent.clone();
        }
        if let Some(subfolder) = &self.subfolder {
            config.sync.subfolder = subfolder.clone();
        }
        if let Some(include) = &self.include {
            config.sync.include = vec![include.clone()];
        }
        if let Some(exclude) = &self.exclude {
            config.sync.exclude = vec![exclude.clone()];
        }
        if let Some(data_pieces) = self.data_pieces {
            config.sync.data_pieces = data_pieces;
        }
        if let Some(parity_pieces) = self.parity_pieces {
            config.sync.parity_pieces = parity_pieces;
        }
        config.sync.archive |= self.archive;
        config.sync.size_only |= self.size_only;
        config.sync.sync_only |= self.sync_only;
        config.sync.dry_run |= self.dry_run;

        config.state.persist |= self.persist || self.state_file.is_some();
        if let Some(file) = &self.state_file {
            config.state.file = Some(file.clone());
        }

        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
        if self.debug {
            config.log.level = "debug".to_string();
        }
        config.log.json |= self.json_logs;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SiaSyncConfig::load(path).await?,
        None => SiaSyncConfig::default(),
    };
    cli.apply(&mut config);
    config.validate(&cli.directory)?;

    let _log_guard = telemetry::init_logging(&config.log)?;

    run(config, &cli.directory).await
}

async fn run(config: SiaSyncConfig, directory: &Path) -> Result<()> {
    let options = Arc::new(config.sync_options()?);

    let sia_dir = config
        .renter
        .sia_dir
        .clone()
        .or_else(|| password::sia_dir(std::env::var(password::DATA_DIR_ENV).ok()));
    let api_password = password::resolve_api_password(
        config.renter.password.as_deref(),
        std::env::var(password::PASSWORD_ENV).ok(),
        sia_dir.as_deref(),
    )?;

    let mut builder = RenterClientBuilder::new(config.renter.address.clone())
        .user_agent(config.renter.agent.clone())
        .timeout(config.renter.timeout);
    if let Some(password) = api_password {
        builder = builder.password(password);
    }
    let client = builder.build().context("Failed to build Sia client")?;

    let version = client
        .daemon_version()
        .await
        .with_context(|| format!("Could not connect to Sia daemon at {}", config.renter.address))?;
    info!(
        address = %config.renter.address,
        version = %version.version,
        "Connected to Sia daemon"
    );

    let store: Arc<dyn RemoteStore> = Arc::new(client);
    let mut folder = SyncFolder::open(directory, options.clone(), store, Arc::new(TracingSink))
        .await
        .with_context(|| format!("Failed to open {}", directory.display()))?;

    info!(
        root = %folder.root().display(),
        prefix = %options.prefix,
        archive = options.archive,
        dry_run = options.dry_run,
        "Starting SiaSync"
    );

    if options.sync_only {
        folder.scan(|_| Ok(())).await?;
        let report = folder.reconcile().await?;
        log_report(&report);
        info!("Sync-only pass finished, exiting");
        return Ok(());
    }

    let (backend, stream) = NotifyBackend::new(DEFAULT_EVENT_CAPACITY)?;
    let (report, handle) = ChangeWatcher::start(folder, backend, stream).await?;
    log_report(&report);
    info!("Watching for changes, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for interrupt")?;
    info!("Interrupt received, closing watcher");

    let folder = handle.close().await?;
    info!(tracked = folder.tracked_count(), "SiaSync stopped");
    Ok(())
}

fn log_report(report: &PassReport) {
    info!(
        session_id = %report.session_id,
        uploaded = report.uploaded,
        removed = report.removed,
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failed,
        pending = report.pending.len(),
        duration_ms = report.duration().map(|d| d.num_milliseconds()).unwrap_or_default(),
        "Startup pass completed"
    );
    for path in &report.pending {
        warn!(path = %path.display(), "Still pending after startup pass");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["siasync"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_directory_is_required() {
        assert!(Cli::try_parse_from(["siasync"]).is_err());
    }

    #[test]
    fn test_no_flags_keep_file_values() {
        let mut config = SiaSyncConfig::default();
        config.sync.subfolder = "from-file".to_string();
        config.sync.archive = true;

        parse(&["/data"]).apply(&mut config);

        assert_eq!(config.sync.subfolder, "from-file");
        assert!(config.sync.archive);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = SiaSyncConfig::default();
        parse(&[
            "--address",
            "10.0.0.2:9980",
            "--subfolder",
            "photos",
            "--include",
            "jpg,png",
            "--data-pieces",
            "4",
            "--size-only",
            "--dry-run",
            "--debug",
            "/data",
        ])
        .apply(&mut config);

        assert_eq!(config.renter.address, "10.0.0.2:9980");
        assert_eq!(config.sync.subfolder, "photos");
        assert_eq!(config.sync.include, vec!["jpg,png".to_string()]);
        assert_eq!(config.sync.data_pieces, 4);
        assert_eq!(config.sync.parity_pieces, 30);
        assert!(config.sync.size_only);
        assert!(config.sync.dry_run);
        assert_eq!(config.log.level, "debug");

        let options = config.sync_options().unwrap();
        assert_eq!(options.filter.include_extensions.len(), 2);
        assert_eq!(options.redundancy.data_pieces, 4);
    }

    #[test]
    fn test_state_file_implies_persist() {
        let mut config = SiaSyncConfig::default();
        parse(&["--state-file", "/tmp/siasync.json", "/data"]).apply(&mut config);
        assert!(config.state.persist);
        assert_eq!(
            config.sync_options().unwrap().persistence_file,
            Some(PathBuf::from("/tmp/siasync.json"))
        );
    }
}
