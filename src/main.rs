// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use backupstore::config::{apply_env_overrides, load_config_with_env, ConfigLoader, LoggingConfig};
use backupstore::{BackupStore, BackupStoreConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Backupstore - inspect and manage backup metadata on storage drivers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Metadata root prefix (overrides config file)
    #[arg(long)]
    root: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List backups at a destination owned by a storage driver
    List {
        /// Destination URL, e.g. nfs://host/store or s3://bucket@region/prefix
        destination: String,

        /// Owning storage driver name
        #[arg(short, long)]
        driver: String,

        /// Only list backups of this volume
        #[arg(short, long)]
        volume: Option<String>,
    },

    /// Show the flat record of a backup
    Inspect {
        backup_url: String,
    },

    /// Show the volume owning a backup
    Volume {
        backup_url: String,
    },

    /// Remove a volume and every backup recorded under it
    RemoveVolume {
        destination: String,
        volume: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config_with_env(path)?,
        None => {
            let mut config = BackupStoreConfig::default();
            apply_env_overrides(&mut config)?;
            config
        }
    };

    // Apply CLI overrides
    if let Some(root) = args.root {
        config.store.root = root;
        ConfigLoader::validate(&config)?;
    }

    init_logging(&config.logging)?;

    info!("Loaded configuration from: {:?}", args.config);
    debug!("Metadata root: {}", config.store.root);

    let store = BackupStore::new(&config);

    match args.command {
        Command::List {
            destination,
            driver,
            volume,
        } => {
            let listing = store.list(volume.as_deref(), &destination, &driver).await?;
            let listing: std::collections::BTreeMap<_, _> = listing
                .into_iter()
                .map(|(url, info)| (url, info.into_map()))
                .collect();
            print_json(&listing)?;
        }

        Command::Inspect { backup_url } => {
            let info = store.get_backup_info(&backup_url).await?;
            print_json(&info.into_map())?;
        }

        Command::Volume { backup_url } => {
            let volume = store.get_volume(&backup_url).await?;
            print_json(&volume)?;
        }

        Command::RemoveVolume {
            destination,
            volume,
        } => {
            let driver = store.driver(&destination)?;
            store.deregister_volume(&volume, driver.as_ref()).await?;
            info!("Removed volume {} from {}", volume, destination);
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let log_level = match logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr; stdout carries command output
    let builder = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}
