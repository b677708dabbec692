use anyhow::Context;
use clap::Parser;
use log::info;

use strata::conf::Config;
use strata::core::{CliArgs, setup_logging};
use strata::partition::read_parquet_input;
use strata::service::DatasetUpdater;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();
    let args = CliArgs::parse();
    info!(args = args; "Strata started.");

    let config_path = args.config.as_deref().context("--config is required")?;
    let config = Config::from_file(config_path)
        .with_context(|| format!("loading config {}", config_path))?;

    let inputs = args
        .inputs
        .iter()
        .map(|path| {
            read_parquet_input(path).with_context(|| format!("reading {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let updater = DatasetUpdater::new(&config)?;
    let result = updater.update(inputs).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
