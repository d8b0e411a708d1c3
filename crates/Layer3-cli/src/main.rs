//! Harbor CLI - Main entry point

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use harbor_core::{validate_manifest_file, RuntimeConfig};
use harbor_foundation::config::load_config_from_file;
use harbor_foundation::{ConfigLoader, HostConfig, CONFIG_DIR_NAME};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Harbor - plugin runtime tooling
#[derive(Parser, Debug)]
#[command(name = "harbor")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a single plugin.json descriptor
    Validate {
        /// Path to the descriptor
        path: PathBuf,
    },
    /// Validate every plugin under the plugins directory
    Scan {
        /// Plugins directory (defaults to settings, then ~/.harbor/plugins)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Settings file (defaults to the layered .harbor settings)
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match args.command {
        Command::Validate { path } => {
            let manifest = validate_manifest_file(&path)
                .await
                .with_context(|| format!("{} is not a valid plugin descriptor", path.display()))?;

            println!(
                "✓ {} ({}) v{} [{}]",
                manifest.name, manifest.id, manifest.version, manifest.plugin_type
            );
            if !manifest.permissions.is_empty() {
                println!("  permissions: {}", manifest.permissions);
            }
            for service in &manifest.services {
                println!(
                    "  service: {}@{} ({} method(s))",
                    service.name,
                    service.version,
                    service.methods.len()
                );
            }
            Ok(())
        }
        Command::Scan {
            dir,
            settings,
            json,
        } => {
            let cwd = std::env::current_dir().context("cannot determine working directory")?;
            let host = load_host_config(&cwd, settings)?;

            let default_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(CONFIG_DIR_NAME)
                .join("plugins");
            let mut config = RuntimeConfig::from_host_config(&host, &cwd, &default_dir);
            if let Some(dir) = dir {
                config.plugins_dir = dir;
            }

            let entries = commands::scan(&config.plugins_dir, &host)
                .await
                .with_context(|| format!("cannot scan {}", config.plugins_dir.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print!("{}", commands::render_table(&entries));
            }

            let invalid = entries
                .iter()
                .filter(|e| e.status == commands::ScanStatus::Invalid)
                .count();
            if invalid > 0 {
                anyhow::bail!("{} plugin(s) failed validation", invalid);
            }
            Ok(())
        }
    }
}

/// 설정 파일 로드 (명시 경로 우선, 없으면 계층 로더)
fn load_host_config(cwd: &std::path::Path, settings: Option<PathBuf>) -> anyhow::Result<HostConfig> {
    match settings {
        Some(path) => load_config_from_file(&path)
            .with_context(|| format!("cannot load settings from {}", path.display())),
        None => Ok(ConfigLoader::new(cwd).load_all()),
    }
}
