//! ScreenGuard command-line shell.
//!
//! Imports an HTML file, runs initialization and one scan pass, and prints
//! the published report as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use screenguard_classifier::{from_config, Classifier, PiiClassifier};
use screenguard_core::AppConfig;
use screenguard_page::{MemoryPage, Page};
use screenguard_scanner::{ChannelReportSink, HttpImageFetcher, KnownTrackerAnalyzer, ScanController};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Scan an HTML page for personal data and unsafe images.
#[derive(Parser, Debug)]
#[command(name = "screenguard", version, about, long_about = None)]
struct Args {
    /// HTML file to scan
    page: PathBuf,

    /// Config file to use instead of the platform default
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL for resolving relative image sources
    #[arg(long)]
    base_url: Option<reqwest::Url>,

    /// Use the pattern detector only
    #[arg(long)]
    no_ai: bool,
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,screenguard=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load_with_env().context("loading configuration")?,
    };
    if args.config.is_some() {
        config.apply_env();
    }
    if args.no_ai {
        config.classifier.use_ai = false;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = load_config(&args)?;

    let html = std::fs::read_to_string(&args.page)
        .with_context(|| format!("reading {}", args.page.display()))?;
    let page: Arc<dyn Page> = Arc::new(MemoryPage::from_html(&html));
    info!("Imported {}", args.page.display());

    let provider = from_config(&config.classifier).context("configuring model provider")?;
    let classifier: Arc<dyn Classifier> = Arc::new(PiiClassifier::new(
        provider,
        &config.scanning,
        config.classifier.require_user_activation,
    ));

    let mut fetcher =
        HttpImageFetcher::new(Duration::from_secs(config.images.fetch_timeout_secs))?;
    if let Some(base) = args.base_url.clone() {
        fetcher = fetcher.with_base_url(base);
    }

    let (sink, _reports) = ChannelReportSink::new();
    let controller = ScanController::with_fetcher(
        page,
        classifier,
        &config,
        Arc::new(sink),
        Arc::new(fetcher),
    )
    .with_tracker(Arc::new(KnownTrackerAnalyzer::new()));

    controller.initialize().await;
    match controller.run_scan().await? {
        Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
        None => info!("Scanning is disabled in the settings"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("screenguard").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_args() {
        let args = parse(&["page.html", "--no-ai", "--config", "sg.toml"]).unwrap();
        assert_eq!(args.page, PathBuf::from("page.html"));
        assert_eq!(args.config, Some(PathBuf::from("sg.toml")));
        assert!(args.no_ai);
        assert!(args.base_url.is_none());

        let args = parse(&["page.html", "--base-url", "https://news.example/story/"]).unwrap();
        assert_eq!(
            args.base_url.map(|url| url.join("img/a.jpg").unwrap().to_string()),
            Some("https://news.example/story/img/a.jpg".to_string())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["a.html", "b.html"]).is_err());
        assert!(parse(&["a.html", "--config"]).is_err());
        assert!(parse(&["a.html", "--verbose"]).is_err());
        assert!(parse(&["a.html", "--base-url", "not a url"]).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scanning]\nmin_text_length = 8\n").unwrap();

        let args = Args {
            page: PathBuf::from("page.html"),
            config: Some(path),
            base_url: None,
            no_ai: true,
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.scanning.min_text_length, 8);
        assert!(!config.classifier.use_ai);
    }
}
