// menusys-cli: diagnostics for the native menu bridge (probe, config).

mod logging;
mod probe;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use menusys_runtime::config::CONFIG_FILE_NAME;
use menusys_runtime::BridgeConfig;
use tracing::debug;

#[derive(Parser)]
#[command(name = "menusys", about = "menusys: diagnostics for the native menu bridge")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the native module and report resolved exports and root availability.
    Probe {
        /// Path to menusys.toml.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Library to open instead of the configured one.
        #[arg(long)]
        library: Option<PathBuf>,
        /// Game directory the configured module path is relative to.
        #[arg(long, default_value = ".")]
        game_dir: PathBuf,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration.
    Config {
        /// Path to menusys.toml.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print as JSON instead of TOML.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    match cli.command {
        Commands::Probe {
            config,
            library,
            game_dir,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            let library = library.unwrap_or_else(|| config.library_path(&game_dir));
            let report = probe::run_probe(&config, &library)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", probe::render_text(&report));
            }
        }
        Commands::Config { config, json } => {
            let config = load_config(config.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }
    Ok(())
}

/// Explicit `--config` must exist; otherwise `menusys.toml` in the working
/// directory is used when present, and defaults when not.
fn load_config(path: Option<&Path>) -> anyhow::Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None if Path::new(CONFIG_FILE_NAME).exists() => {
            debug!("using {CONFIG_FILE_NAME} from the working directory");
            Ok(BridgeConfig::from_file(CONFIG_FILE_NAME)?)
        }
        None => Ok(BridgeConfig::default()),
    }
}
