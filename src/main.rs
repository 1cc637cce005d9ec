mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use framestore::config::Config;
use framestore::observability;
use framestore::queue::QueueStore;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut config = Config::load_unvalidated(cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.store.data_dir = Some(data_dir);
    }
    config.validate()?;

    observability::init_tracing(&config.telemetry)?;

    let store = QueueStore::open(&config.store)?;
    let result = commands::run(&store, cli.command);
    store.close()?;
    result
}
