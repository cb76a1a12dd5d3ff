use std::{path::Path, time::Duration};

use bevy::{app::ScheduleRunnerPlugin, log::LogPlugin, prelude::*};
use clap::Parser;

mod advisor;
mod cli;
mod core;
mod ledger;
mod store;

use crate::{
    advisor::AdvisorPlugin,
    cli::{Cli, CliPlugin},
    core::CorePlugin,
    ledger::{LedgerPlugin, LedgerStorage},
};

const FRAME_INTERVAL: Duration = Duration::from_millis(10);

fn main() -> AppExit {
    load_secrets_env();
    let cli = Cli::parse();

    let storage = if cli.ephemeral {
        LedgerStorage::InMemory
    } else {
        LedgerStorage::FromSettings
    };

    App::new()
        .add_plugins((
            MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(FRAME_INTERVAL)),
            LogPlugin::default(),
            CorePlugin::with_config_path(&cli.config).with_data_dir(cli.data_dir.clone()),
            LedgerPlugin::with_storage(storage),
            AdvisorPlugin::default(),
            CliPlugin::new(cli.command),
        ))
        .run()
}

fn load_secrets_env() {
    const SECRETS_FILE: &str = "secrets.env";

    let path = Path::new(SECRETS_FILE);
    if !path.exists() {
        return;
    }

    if let Err(err) = dotenvy::from_filename(path) {
        eprintln!("Failed to load {}: {}", SECRETS_FILE, err);
    }
}
