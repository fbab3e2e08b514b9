//! Autologin-Crawl main entry point
//!
//! This is the command-line interface for the authentication-aware crawler.

use anyhow::{Context, Result};
use autologin_crawl::auth::{looks_like_logout, LinkCandidate};
use autologin_crawl::config::{load_config_with_hash, Config};
use autologin_crawl::crawler::{run_crawl, solver_for};
use autologin_crawl::output::{print_report, report_json};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Autologin-Crawl: a crawler that stays logged in
///
/// Crawls a site behind a login, re-authenticating through an external login
/// solver whenever the site drops the session, and never following links
/// that would log it out.
#[derive(Parser, Debug)]
#[command(name = "autologin-crawl")]
#[command(version)]
#[command(about = "A crawler that stays logged in", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "check_link")]
    dry_run: bool,

    /// Report whether a link would be skipped as a logout link, then exit
    #[arg(long, value_name = "URL")]
    check_link: Option<String>,

    /// Print the crawl report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Anchor text to use with --check-link
    #[arg(long, value_name = "TEXT", requires = "check_link", default_value = "")]
    text: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if let Some(link) = cli.check_link.as_deref() {
        handle_check_link(&config, link, &cli.text)?;
    } else {
        handle_crawl(config, cli.json).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("autologin_crawl=info,warn"),
            1 => EnvFilter::new("autologin_crawl=debug,info"),
            2 => EnvFilter::new("autologin_crawl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Autologin-Crawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Start URL: {}", config.crawler.start_url);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    println!("  Download delay: {}ms", config.crawler.download_delay);
    match config.crawler.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unlimited"),
    }
    println!("  Same site only: {}", config.crawler.same_site_only);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    let autologin = &config.autologin;
    println!("\nAutologin:");
    if autologin.enabled {
        println!("  Login URL: {}", autologin.login_url);
        println!("  Username: {}", autologin.username);
        println!("  Max login attempts: {}", autologin.max_login_attempts);
        match autologin.pending_queue_capacity {
            Some(capacity) => println!("  Pending queue capacity: {}", capacity),
            None => println!("  Pending queue capacity: unbounded"),
        }
        println!(
            "  Delay between login attempts: {}ms",
            autologin.auth_delay().as_millis()
        );
        if let Some(marker) = &autologin.logout_url_marker {
            println!("  Logout URL marker: {}", marker);
        }
        if let Some(signature) = &autologin.login_form_signature {
            println!("  Login form signature: {}", signature);
        }
        match &autologin.solver_url {
            Some(url) => println!("  Login solver: {}", url),
            None => println!("  Login solver: none (logins will fail)"),
        }
    } else {
        println!("  Disabled");
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --check-link mode: runs the logout classifier on one link
fn handle_check_link(config: &Config, link: &str, text: &str) -> Result<()> {
    let base = Url::parse(&config.crawler.start_url).context("Invalid start URL")?;
    let target = base
        .join(link)
        .with_context(|| format!("Invalid link: {}", link))?;

    let candidate = LinkCandidate::new(target.clone(), text);
    if looks_like_logout(&candidate, &config.autologin) {
        println!("{} looks like a logout link and would be skipped", target);
    } else {
        println!("{} would be followed", target);
    }
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, json: bool) -> Result<()> {
    let solver = solver_for(&config)?;
    tracing::info!(
        "Using login solver: {}",
        if config.autologin.enabled {
            solver.name()
        } else {
            "disabled"
        }
    );

    let report = match run_crawl(config, solver).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report);
    }
    Ok(())
}
