//! vaultsync CLI - Command line interface for syncing vault files.
//!
//! This tool fetches vault files from a directory-backed remote into the
//! local cache, stages offline edits, and reconciles them with the remote.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use vaultsync_common::FileDescriptor;
use vaultsync_storage::{
    DirectoryClient, FileSystemProvider, OnConflictStrategy, RemoteFileCache,
    RemoteFileSystemProvider, RemoteProvider, SqliteFileCache,
};
use vaultsync_sync::{RemoteSyncProcessor, SyncConfig, SyncCoordinator, SyncProcessor};

#[derive(Parser)]
#[command(name = "vaultsync")]
#[command(about = "vaultsync - Keep cached vault files in sync with a remote")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory acting as the remote backend.
    #[arg(short, long)]
    remote_root: PathBuf,

    /// Override the cache directory from the configuration.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a remote directory.
    Ls {
        /// Remote directory (default: root).
        #[arg(default_value = "/")]
        dir: String,
    },

    /// Fetch a remote file into the cache.
    Pull {
        /// Remote file path.
        path: String,
    },

    /// Replace the cached copy of a file without uploading it.
    Stage {
        /// Remote file path.
        path: String,

        /// Local file with the new content.
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Reconcile cached copies with the remote.
    Sync {
        /// Remote file path (default: every file with local changes).
        path: Option<String>,

        /// What to do when the remote copy is newer.
        #[arg(long, value_enum)]
        on_conflict: Option<ConflictArg>,
    },

    /// Show the sync status of a cached file.
    Status {
        /// Remote file path.
        path: String,
    },

    /// List files with local changes not yet uploaded.
    Pending,
}

#[derive(Clone, Copy, ValueEnum)]
enum ConflictArg {
    Rewrite,
    Cancel,
}

impl From<ConflictArg> for OnConflictStrategy {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Rewrite => OnConflictStrategy::Rewrite,
            ConflictArg::Cancel => OnConflictStrategy::Cancel,
        }
    }
}

/// Everything a command needs, wired from the configuration.
struct App {
    config: SyncConfig,
    cache: Arc<SqliteFileCache>,
    provider: Arc<RemoteProvider>,
    coordinator: SyncCoordinator,
}

impl App {
    fn open(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => SyncConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => SyncConfig::default(),
        };
        if let Some(cache_dir) = &cli.cache_dir {
            config.cache_dir = cache_dir.clone();
            config.cache_db = cache_dir.join("cache.db");
        }

        if let Some(parent) = config.cache_db.parent() {
            std::fs::create_dir_all(parent).context("Failed to create cache directory")?;
        }
        let cache = Arc::new(
            SqliteFileCache::open(&config.cache_db).context("Failed to open cache database")?,
        );
        let client = Arc::new(
            DirectoryClient::new(&cli.remote_root).context("Failed to open remote root")?,
        );
        let provider = Arc::new(
            RemoteProvider::new(client, cache.clone(), &config.cache_dir)
                .context("Failed to set up remote provider")?,
        );
        let processor: Arc<dyn SyncProcessor> =
            Arc::new(RemoteSyncProcessor::new(provider.clone(), cache.clone()));

        Ok(Self {
            config,
            cache,
            provider,
            coordinator: SyncCoordinator::new(processor),
        })
    }

    /// Cached descriptor of a tracked file.
    fn cached(&self, path: &str) -> Result<FileDescriptor> {
        let remote = self
            .provider
            .get_file(path, true)
            .with_context(|| format!("Failed to resolve {}", path))?;
        let entry = self
            .cache
            .get_by_uid(&remote.uid)?
            .with_context(|| format!("{} is not cached, pull it first", path))?;
        Ok(entry.to_file_descriptor())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Storage and sync calls block; keep them off the runtime threads.
    tokio::task::spawn_blocking(move || run(cli))
        .await
        .context("Command task failed")?
}

fn run(cli: Cli) -> Result<()> {
    let app = App::open(&cli)?;

    match cli.command {
        Commands::Ls { dir } => cmd_ls(&app, &dir),
        Commands::Pull { path } => cmd_pull(&app, &path),
        Commands::Stage { path, source } => cmd_stage(&app, &path, &source),
        Commands::Sync { path, on_conflict } => {
            let on_conflict = on_conflict
                .map(OnConflictStrategy::from)
                .unwrap_or(app.config.on_conflict);
            cmd_sync(&app, path.as_deref(), on_conflict)
        }
        Commands::Status { path } => cmd_status(&app, &path),
        Commands::Pending => cmd_pending(&app),
    }
}

/// List a remote directory.
fn cmd_ls(app: &App, dir: &str) -> Result<()> {
    let dir = app
        .provider
        .get_file(dir, false)
        .with_context(|| format!("Failed to resolve {}", dir))?;
    let mut entries = app
        .provider
        .list_files(&dir)
        .context("Failed to list directory")?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    if entries.is_empty() {
        println!("(empty directory)");
        return Ok(());
    }

    for entry in entries {
        let kind = if entry.is_directory { "DIR " } else { "FILE" };
        println!(
            "{} {}  {}",
            kind,
            entry.modified_at.format("%Y-%m-%d %H:%M:%S"),
            entry.name
        );
    }

    Ok(())
}

/// Fetch a remote file into the cache.
fn cmd_pull(app: &App, path: &str) -> Result<()> {
    info!("Pulling {}", path);

    let file = app
        .provider
        .get_file(path, false)
        .with_context(|| format!("Failed to resolve {}", path))?;
    let mut stream = app
        .provider
        .open_remote_file_for_read(&file, app.config.on_conflict, false)
        .context("Failed to fetch file")?;
    let size = io::copy(&mut stream, &mut io::sink()).context("Failed to read file")?;

    let entry = app
        .cache
        .get_by_uid(&file.uid)?
        .context("Fetched file missing from cache")?;
    println!("Pulled {} ({} bytes)", path, size);
    println!("  Cached at: {}", entry.local_path.display());

    Ok(())
}

/// Replace the cached copy and leave the upload for the next sync.
fn cmd_stage(app: &App, path: &str, source: &Path) -> Result<()> {
    let file = app.cached(path)?;
    let mut input = File::open(source)
        .with_context(|| format!("Failed to open {}", source.display()))?;

    let mut stream = app
        .provider
        .open_remote_file_for_write(&file, OnConflictStrategy::Cancel, true)
        .context("Failed to open cached copy")?;
    let size = io::copy(&mut input, &mut stream).context("Failed to write cached copy")?;
    stream.close().context("Failed to save cached copy")?;

    println!("Staged {} bytes for {}", size, path);
    Ok(())
}

/// Sync one file, or every file with local changes.
fn cmd_sync(app: &App, path: Option<&str>, on_conflict: OnConflictStrategy) -> Result<()> {
    let files = match path {
        Some(path) => vec![app.cached(path)?],
        None => app.coordinator.processor().locally_modified_files()?,
    };

    if files.is_empty() {
        println!("Nothing to sync.");
        return Ok(());
    }

    let mut failed = 0;
    for file in &files {
        match app
            .coordinator
            .process(file, app.config.sync_strategy, on_conflict)
        {
            Ok(synced) => println!(
                "Synced {} (modified {})",
                synced.path,
                synced.modified_at.format("%Y-%m-%d %H:%M:%S")
            ),
            Err(e) => {
                failed += 1;
                println!("Failed {}: {} [{}]", file.path, e, e.kind());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} files failed to sync", failed, files.len());
    }
    Ok(())
}

/// Show the sync status of a cached file.
fn cmd_status(app: &App, path: &str) -> Result<()> {
    let file = app.cached(path)?;
    let status = app
        .coordinator
        .processor()
        .sync_status(&file)
        .context("Failed to compare with remote")?;

    println!("{}: {}", path, status);
    Ok(())
}

/// List files with local changes not yet uploaded.
fn cmd_pending(app: &App) -> Result<()> {
    let files = app.coordinator.processor().locally_modified_files()?;

    if files.is_empty() {
        println!("No local changes.");
        return Ok(());
    }

    for file in files {
        println!(
            "{}  (edited {})",
            file.path,
            file.modified_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_sync() {
        let cli = Cli::try_parse_from([
            "vaultsync",
            "--remote-root",
            "/mnt/share",
            "sync",
            "/db.kdbx",
            "--on-conflict",
            "rewrite",
        ])
        .unwrap();

        match cli.command {
            Commands::Sync { path, on_conflict } => {
                assert_eq!(path.as_deref(), Some("/db.kdbx"));
                assert_eq!(
                    on_conflict.map(OnConflictStrategy::from),
                    Some(OnConflictStrategy::Rewrite)
                );
            }
            _ => panic!("expected sync command"),
        }
    }

    #[test]
    fn test_remote_root_required() {
        assert!(Cli::try_parse_from(["vaultsync", "pending"]).is_err());
    }
}
