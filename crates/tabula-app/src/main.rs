mod cli;
mod commands;
mod direct;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter};

use tabula_core::config::TabulaConfig;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Tracing. RUST_LOG wins; otherwise the filter is swapped for the
    // configured level once the config is loaded. Logs go to stderr so
    // command output can be piped.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let filter_from_env = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| EnvFilter::new(args.resolve_log_level(None))),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Tabula v{}", env!("CARGO_PKG_VERSION"));

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = TabulaConfig::load_or_default(&config_file);
    args.apply_overrides(&mut config);
    if !filter_from_env {
        filter_handle.reload(EnvFilter::new(args.resolve_log_level(Some(&config))))?;
    }
    config.validate()?;

    if let Command::InitConfig { force } = args.command {
        println!("{}", commands::init_config(&config, &config_file, force)?);
        return Ok(());
    }

    let opened = commands::open_source(&config)?;

    match args.command {
        Command::Schema { .. } => println!("{}", commands::schema(&opened, &config)?),
        Command::Prompt => println!("{}", commands::prompt(&opened, &config)?),
        Command::Preview { ref sql, json, .. } => {
            println!("{}", commands::preview(&opened, &config, sql, json)?)
        }
        Command::Export {
            ref output,
            ref sql,
            ref title,
            ref into,
        } => {
            let rows =
                commands::export(&opened, &config, sql.as_deref(), title, output, into).await?;
            println!("Exported {} rows to {} ({})", rows, output.display(), into);
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}
