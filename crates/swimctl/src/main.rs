//! SWIM Control - run software image upgrades against network appliances

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use swim_common::SwimConfig;
use swimctl::commands::{self, DeviceArgs};
use swimctl::logging;

// Version is embedded at build time
const VERSION: &str = env!("SWIM_VERSION");

#[derive(Parser)]
#[command(name = "swimctl")]
#[command(about = "SWIM - software image management for network appliances", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Config file (default: $SWIM_CONFIG or /etc/swim/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workflow against one device
    Run {
        /// Device record JSON (default: $SWIMLIB_DEVICE_JSON)
        #[arg(long)]
        device: Option<PathBuf>,

        /// Override the record's execution type (dry_run, copy, stage, upgrade)
        #[arg(long)]
        depth: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve software and show the plan without connecting
    Check {
        #[arg(long)]
        device: Option<PathBuf>,

        #[arg(long)]
        depth: Option<String>,
    },

    /// List catalog models, or show one model's software
    Catalog { model: Option<String> },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match dispatch(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn dispatch(cli: Cli) -> Result<i32> {
    let mut config = SwimConfig::load(cli.config.as_deref())?;
    config.apply_env();

    match cli.command {
        Commands::Run {
            device,
            depth,
            json,
        } => {
            let args = DeviceArgs {
                device: device.as_deref(),
                depth: depth.as_deref(),
            };
            commands::run(&config, &args, json)
        }
        Commands::Check { device, depth } => {
            let args = DeviceArgs {
                device: device.as_deref(),
                depth: depth.as_deref(),
            };
            commands::check(&config, &args)
        }
        Commands::Catalog { model } => commands::catalog(&config, model.as_deref()),
    }
}
