use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use packsync_core::{
    config::{self, AppConfig},
    resource::{ArtifactRegistry, AssetSyncReport, LibrarySyncReport},
    DirectoryMirror, Observers, SyncCoordinator, SyncOptions, TextureManager,
};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "packsync", version, about = "Keep asset bundles and libraries in sync")]
struct Cli {
    /// Override the data root holding hashes.json and the synced bundles.
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Override the local mirror used as download source.
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sync the default assets and refresh extras.
    Sync {
        /// Resync even if nothing changed.
        #[arg(long)]
        force: bool,
        /// Wipe the asset folder before resyncing.
        #[arg(long)]
        clean: bool,
        /// Only report completion, not per-file progress.
        #[arg(long)]
        quiet: bool,
    },
    /// Sync and load the native libraries.
    Libs,
    /// Refresh only the extras blobs.
    Extras,
    /// Run the asset and library flows side by side.
    All {
        /// Resync assets even if nothing changed.
        #[arg(long)]
        force: bool,
        /// Wipe the asset folder before resyncing.
        #[arg(long)]
        clean: bool,
    },
    /// Decode a texture from a resource pack.
    Texture {
        /// Resource key, e.g. `minecraft:block/stone`.
        key: String,
        /// Pack directory; defaults to the synced default assets.
        #[arg(long)]
        pack: Option<PathBuf>,
        /// Resize to WIDTHxHEIGHT.
        #[arg(long, value_parser = parse_size)]
        size: Option<(u32, u32)>,
        /// Output PNG path.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    config::ensure_default_config()?;
    let mut config = AppConfig::load()?;
    if let Some(root) = cli.data_root {
        config.data_root = root;
    }
    if let Some(source) = cli.source {
        config.source_root = Some(source);
    }

    match cli.command {
        Command::Sync {
            force,
            clean,
            quiet,
        } => {
            let coordinator = SyncCoordinator::from_config(&config)
                .with_reduced_info(quiet || config.reduced_download_info);
            let mirror = mirror(&config)?;
            let options = SyncOptions {
                force,
                clean: clean || config.clean_on_resync,
            };
            let report = coordinator.sync_assets(&mirror, options, &Observers::console())?;
            report_assets(report);
        }
        Command::Libs => {
            let coordinator = SyncCoordinator::from_config(&config);
            let report = coordinator.sync_libraries(
                &mirror(&config)?,
                &ArtifactRegistry::new(),
                &Observers::console(),
            )?;
            report_libraries(report);
        }
        Command::Extras => {
            let coordinator = SyncCoordinator::from_config(&config);
            match coordinator.reload_extras(&mirror(&config)?)? {
                Some(count) => info!("loaded {count} extras"),
                None => warn!("asset sync in progress, extras not reloaded"),
            }
        }
        Command::All { force, clean } => {
            let coordinator = Arc::new(SyncCoordinator::from_config(&config));
            let mirror = Arc::new(mirror(&config)?);
            let options = SyncOptions {
                force,
                clean: clean || config.clean_on_resync,
            };

            let assets = tokio::task::spawn_blocking({
                let coordinator = Arc::clone(&coordinator);
                let mirror = Arc::clone(&mirror);
                move || coordinator.sync_assets(mirror.as_ref(), options, &Observers::console())
            });
            let libraries = tokio::task::spawn_blocking({
                let coordinator = Arc::clone(&coordinator);
                let mirror = Arc::clone(&mirror);
                move || {
                    coordinator.sync_libraries(
                        mirror.as_ref(),
                        &ArtifactRegistry::new(),
                        &Observers::console(),
                    )
                }
            });

            let (assets, libraries) = tokio::join!(assets, libraries);
            report_assets(assets.context("asset sync task panicked")??);
            report_libraries(libraries.context("library sync task panicked")??);
        }
        Command::Texture {
            key,
            pack,
            size,
            out,
        } => {
            let pack = pack.unwrap_or_else(|| {
                packsync_core::AssetLayout::new(&config.data_root).default_assets()
            });
            let manager = TextureManager::from_config(&config);
            let count = manager.load_pack_dir(&pack)?;
            info!("registered {count} entries from {}", pack.display());

            let resource = manager
                .get(&key)
                .ok_or_else(|| anyhow!("no texture named {key} in {}", pack.display()))?;
            let image = match size {
                Some((width, height)) => resource.texture_sized(width, height)?,
                None => resource.texture()?,
            };

            let out = out.unwrap_or_else(|| PathBuf::from(format!("{}.png", file_stem(&key))));
            image
                .save(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("{} ({}x{}) -> {}", key, image.width(), image.height(), out.display());

            if let Some(meta) = resource.texture_meta().and_then(|meta| meta.meta().cloned()) {
                println!("{}", serde_json::to_string_pretty(&meta)?);
            }
        }
    }

    Ok(())
}

fn mirror(config: &AppConfig) -> Result<DirectoryMirror> {
    let source = config.source_root.as_ref().ok_or_else(|| {
        anyhow!("no source configured; pass --source or set PACKSYNC_SOURCE_ROOT")
    })?;
    if !source.is_dir() {
        bail!("source {} is not a directory", source.display());
    }
    Ok(DirectoryMirror::new(source))
}

fn report_assets(report: Option<AssetSyncReport>) {
    match report {
        Some(report) => info!(
            "assets at {} ({}), {} extras",
            report.hash,
            match report.reason {
                Some(reason) => format!("resynced: {reason:?}"),
                None => "up to date".to_string(),
            },
            report.extras
        ),
        None => warn!("another asset sync is running"),
    }
}

fn report_libraries(report: Option<LibrarySyncReport>) {
    match report {
        Some(report) => {
            info!(
                "libraries at {}: {} downloaded, {} loaded",
                report.hash,
                report.downloaded.len(),
                report.loaded.len()
            );
            if !report.download_failed.is_empty() || !report.load_failed.is_empty() {
                warn!(
                    "{} downloads and {} loads failed",
                    report.download_failed.len(),
                    report.load_failed.len()
                );
            }
        }
        None => warn!("another library sync is running"),
    }
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value}"))?;
    let width = width.trim().parse().map_err(|err| format!("bad width: {err}"))?;
    let height = height.trim().parse().map_err(|err| format!("bad height: {err}"))?;
    Ok((width, height))
}

fn file_stem(key: &str) -> String {
    key.rsplit(['/', ':']).next().unwrap_or(key).to_string()
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("packsync.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stdout);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("16x32"), Ok((16, 32)));
        assert_eq!(parse_size("8X8"), Ok((8, 8)));
        assert!(parse_size("16").is_err());
        assert!(parse_size("ax2").is_err());
    }

    #[test]
    fn output_name_uses_last_key_segment() {
        assert_eq!(file_stem("minecraft:block/stone"), "stone");
        assert_eq!(file_stem("stone"), "stone");
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
