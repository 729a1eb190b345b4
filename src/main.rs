use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use rss_extractor::{Config, ExtractError, Feed, FeedExtractor};

/// Get the default config file path (~/.config/rss-extractor/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("rss-extractor")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "rss-extractor", about = "Fetch RSS/Atom feeds and print a normalized summary")]
struct Args {
    /// Feed URLs to fetch (defaults to `default_feeds` from the config file)
    urls: Vec<String>,

    /// Config file path
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Relay prefix override; pass an empty string to fetch directly
    #[arg(long, value_name = "PREFIX")]
    relay: Option<String>,

    /// Number of articles shown per feed
    #[arg(long, value_name = "N")]
    articles: Option<u32>,

    /// Print the JSON export of all fetched feeds instead of the text summary
    #[arg(long)]
    export: bool,
}

fn print_feed(url: &str, feed: &Feed) {
    let title = if feed.title.is_empty() { "Untitled Feed" } else { feed.title.as_str() };
    println!("== {} ({} items)", title, feed.items.len());
    println!("   {}", url);
    if !feed.description.is_empty() {
        println!("   {}", feed.description);
    }
    for item in feed.items.iter().take(feed.articles as usize) {
        match item.publish_date {
            Some(date) => println!("  - [{}] {}", date.format("%Y-%m-%d"), item.title),
            None => println!("  - {}", item.title),
        }
        if !item.link.is_empty() {
            println!("    {}", item.link);
        }
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    if let Some(relay) = args.relay {
        config.relay_prefix = relay;
    }
    if let Some(articles) = args.articles {
        config.default_articles = articles;
    }

    let urls = if args.urls.is_empty() {
        config.default_feeds.clone()
    } else {
        args.urls
    };
    if urls.is_empty() {
        anyhow::bail!("No feed URLs given and no default_feeds configured");
    }

    let extractor = FeedExtractor::from_config(&config).context("Failed to create HTTP client")?;
    let outcomes = extractor.fetch_all(&urls, config.concurrency).await;

    let mut failures = 0usize;
    for outcome in &outcomes {
        if let Err(e) = &outcome.result {
            failures += 1;
            let kind = match e {
                ExtractError::Fetch(_) => "could not fetch",
                ExtractError::Parse(_) => "not a valid feed",
            };
            eprintln!("Failed to add feed {} ({}): {}", outcome.url, kind, e);
        }
    }

    if args.export {
        println!("{}", extractor.export().context("Failed to export feeds")?);
    } else {
        // Registry order is the order feeds finished, list them in request order instead
        for url in &urls {
            if let Some(feed) = extractor.get_feed(url) {
                print_feed(url, &feed);
            }
        }
    }

    if failures == outcomes.len() {
        anyhow::bail!("All {} feeds failed", failures);
    }
    Ok(())
}
