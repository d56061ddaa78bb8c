mod app;
mod cache;
mod config;
mod content;
mod error;
mod event;
mod i18n;
mod route;
mod router;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crypto-guide")]
#[command(about = "Browse The Road to Crypto guide content from the terminal")]
#[command(version)]
struct Args {
  /// Site path to open, e.g. /development-roadmap/phase-1/database-schemas.html
  #[arg(default_value = "/")]
  path: String,

  /// Language code (must be one of the configured supported languages)
  #[arg(short, long)]
  lang: Option<String>,

  /// Path to config file (default: $XDG_CONFIG_HOME/crypto-guide/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Serve from the local cache only, without touching the network
  #[arg(long)]
  offline: bool,

  /// Print the breadcrumb trail for the opened route
  #[arg(long)]
  crumbs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;

  let app = app::App::new(config, args.offline).await?;
  app.open(&args.path, args.lang.as_deref(), args.crumbs).await?;

  Ok(())
}
