use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use offcache::{CacheStore, Config, HttpFetcher, OfflineCacheManager, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "offcache")]
#[command(about = "Offline-first asset cache worker")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/offcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Site origin to fetch against, overriding the config
  #[arg(long)]
  origin: Option<String>,

  /// Cache generation label, overriding the config
  #[arg(long)]
  label: Option<String>,

  /// Cache database path (default: platform data directory)
  #[arg(long)]
  db: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch and cache every manifest asset into the current generation
  Install,
  /// Purge every cache generation except the current one
  Activate,
  /// Serve one request: cache first, then network, then cached fallback
  Fetch {
    /// Site-relative path or absolute URL
    path: String,
  },
  /// List cache generations and their entries
  Status,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_tracing(args.log_file.as_deref())?;

  // Load configuration, then apply command-line overrides
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(origin) = args.origin {
    config.site.origin = origin;
  }
  if let Some(label) = args.label {
    config.cache.label = label;
  }

  let store = Arc::new(match &args.db {
    Some(path) => SqliteStore::open_at(path)?,
    None => SqliteStore::open()?,
  });
  let net = Arc::new(HttpFetcher::new(&config.site.origin)?);
  let worker = OfflineCacheManager::new(store.clone(), net, &config.cache);

  match args.command {
    Command::Install => {
      worker.on_install().await?;
      println!(
        "Installed {} assets into generation {}",
        config.cache.manifest.len(),
        config.cache.label
      );
    }
    Command::Activate => {
      let purged = worker.on_activate().await?;
      println!(
        "Activated generation {}; purged {} stale generation(s)",
        config.cache.label, purged
      );
    }
    Command::Fetch { path } => {
      let served = worker.on_fetch(&path).await?;
      eprintln!(
        "{} {} ({} bytes, {:?})",
        served.response.status,
        served.response.url,
        served.response.body.len(),
        served.source
      );
      std::io::stdout().write_all(&served.response.body)?;
    }
    Command::Status => {
      let labels = store.keys().await?;
      if labels.is_empty() {
        println!("No cache generations");
      }
      for label in labels {
        let urls = store.entries(&label).await?;
        let marker = if label == config.cache.label {
          " (current)"
        } else {
          ""
        };
        println!("{}{}: {} entries", label, marker, urls.len());
        for url in urls {
          println!("  {}", url);
        }
      }
    }
  }

  Ok(())
}

/// Set up the global subscriber. The returned guard must stay alive for
/// the non-blocking file writer to flush.
fn init_tracing(
  log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  if let Some(path) = log_file {
    let file = std::fs::File::create(path)
      .map_err(|e| eyre!("Failed to create log file {}: {}", path.display(), e))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(writer)
      .with_ansi(false)
      .init();
    Ok(Some(guard))
  } else {
    tracing_subscriber::fmt()
      .with_env_filter(filter)
      .with_writer(std::io::stderr)
      .init();
    Ok(None)
  }
}
