mod api;
mod capture;
mod config;
mod core;
mod display;
mod domain;
mod error;
#[cfg(test)]
mod testing;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = core::app::Cli::parse();
    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    core::app::run(cli).await
}
