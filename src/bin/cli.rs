use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use csv_to_playlist as lib;
use lib::api::spotify::SpotifyProvider;
use lib::config::Config;
use lib::uploader::PlaylistUploader;
use std::path::PathBuf;
use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "csv-to-playlist", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dotenv file with SPOTIFY_* variables (defaults to ./.env when present)
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a playlist from a CSV with `track` and `artist` columns
    Upload {
        /// CSV file; its base name becomes the playlist name
        csv: PathBuf,
        /// Optional JPEG to use as the playlist cover
        image: Option<PathBuf>,
        /// Only resolve tracks and print the matches; create nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Authorize Spotify interactively and print the resulting tokens
    Auth,
    /// Validate config and credentials and exit
    ConfigValidate,
}

fn init_logging(cfg: &Config) -> Option<WorkerGuard> {
    let _ = LogTracer::init();

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let (file_layer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "csv-to-playlist.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (Some(fmt::layer().with_writer(non_blocking)), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    tracing_subscriber_global::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    lib::config::load_dotenv(cli.env_file.as_deref())?;

    let config_path = cli.config.clone().or_else(Config::default_path);
    let cfg = Config::load(config_path.as_deref()).with_context(|| match &config_path {
        Some(p) => format!("loading config from {}", p.display()),
        None => "loading config from environment".to_string(),
    })?;

    let _guard = init_logging(&cfg);

    match cli.command {
        Commands::Upload { csv, image, dry_run } => {
            let credentials = if dry_run {
                cfg.search_credentials()?
            } else {
                cfg.credentials()?
            };
            let provider = SpotifyProvider::new(credentials, cfg.endpoints());
            let uploader = PlaylistUploader::new(provider).with_batch_size(cfg.batch_size());

            if dry_run {
                let requests = lib::input::load_requests(&csv)
                    .with_context(|| format!("reading {}", csv.display()))?;
                let resolution = uploader.resolve_all(&requests).await;
                for uri in &resolution.resolved {
                    println!("{}", uri);
                }
                tracing::info!(
                    "Dry run: {} of {} rows resolved",
                    resolution.resolved.len(),
                    requests.len()
                );
                return Ok(());
            }

            let summary = uploader
                .run(&csv, image.as_deref())
                .await
                .with_context(|| format!("creating playlist from {}", csv.display()))?;
            tracing::info!(
                playlist_id = %summary.playlist_id,
                resolved = summary.resolved.len(),
                unresolved = summary.unresolved.len(),
                batches_added = summary.batches_added,
                batches_failed = summary.batches_failed,
                "Run complete"
            );
        }
        Commands::Auth => {
            lib::api::spotify_auth::run_spotify_auth(&cfg).await?;
        }
        Commands::ConfigValidate => match cfg.credentials() {
            Ok(_) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {}", e);
                std::process::exit(2);
            }
        },
    }

    Ok(())
}
