use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use opdsview::config::Config;
use opdsview::opds::{fetch_feed, parse_catalog, Feed};

/// Get the config file path (~/.config/opdsview/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("opdsview")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "opdsview", about = "Convert OPDS catalogs into display-ready JSON views")]
struct Args {
    /// Config file (defaults to ~/.config/opdsview/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the catalogs configured in the config file
    Catalogs,
    /// Convert one catalog page to its view
    Browse {
        /// Configured catalog identifier, http(s) URL, or local file
        source: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let converter = config.converter();

    match &args.command {
        Command::Catalogs => {
            let views = converter.convert_documents_to_view(&config.catalog_documents());
            print_json(&views, args.pretty)?;
        }
        Command::Browse { source } => {
            let feed = load_feed(&config, source).await?;
            let result = converter
                .convert_feed_to_view(&feed)
                .with_context(|| format!("Cannot display catalog '{}'", source))?;
            print_json(&result, args.pretty)?;
        }
    }

    Ok(())
}

/// Resolves SOURCE in order: configured identifier, URL, local file.
async fn load_feed(config: &Config, source: &str) -> Result<Feed> {
    let url = match config.find_catalog(source) {
        Some(document) => {
            tracing::debug!(identifier = %document.identifier, url = %document.url, "Using configured catalog");
            Some(document.url)
        }
        None if source.starts_with("http://") || source.starts_with("https://") => {
            Some(source.to_string())
        }
        None => None,
    };

    if let Some(url) = url {
        let options = config.fetch_options();
        let client = reqwest::Client::builder()
            .user_agent(concat!("opdsview/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(options.timeout)
            .read_timeout(options.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        return fetch_feed(&client, &url, &options)
            .await
            .with_context(|| format!("Failed to fetch catalog {}", url));
    }

    read_feed_file(Path::new(source)).await
}

async fn read_feed_file(path: &Path) -> Result<Feed> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;

    // A local file has no meaningful base URL; hrefs are kept as written
    parse_catalog(&bytes, None)
        .with_context(|| format!("Failed to parse catalog file: {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}
