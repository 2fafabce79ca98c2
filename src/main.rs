//! Site-Ferry main entry point
//!
//! This is the command-line interface for crawling a site and converting
//! the captured pages into a component manifest.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use site_ferry::config::load_config_with_hash;
use site_ferry::output::{format_status_report, load_statistics, print_statistics, write_manifest};
use site_ferry::storage::{self, ConversionStatus};
use site_ferry::{CrawlOptions, CrawlService, CrawlStatus};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Site-Ferry: crawl a site and ferry it into components
///
/// Site-Ferry crawls a seed site to a bounded depth while respecting
/// robots.txt and per-origin spacing, stores the pages it finds and turns
/// a completed crawl into a framework-ready page/component manifest.
#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(version)]
#[command(about = "Crawl a website and convert it into components", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site and wait for the crawl to finish
    Crawl {
        /// Seed URL
        seed: String,

        /// Maximum link depth from the seed
        #[arg(short, long, default_value_t = 2)]
        depth: u32,

        /// Owner recorded on the crawl
        #[arg(long, default_value = "local")]
        user: String,

        /// Download `<img>` sources
        #[arg(long)]
        images: bool,

        /// Skip linked stylesheets and inline styles
        #[arg(long)]
        no_css: bool,

        /// Skip shared navigation extraction
        #[arg(long)]
        no_nav: bool,

        /// Fetch pages even where robots.txt disallows them
        #[arg(long)]
        ignore_robots: bool,
    },

    /// Show the status and recent log of a crawl
    Status {
        crawl_id: i64,

        /// Number of log lines to show
        #[arg(long, default_value_t = 20)]
        logs: usize,
    },

    /// Show page, asset and log statistics of a crawl
    Stats { crawl_id: i64 },

    /// List a user's crawls
    List {
        #[arg(long, default_value = "local")]
        user: String,
    },

    /// Convert a completed crawl into a component manifest
    Convert {
        crawl_id: i64,

        /// Write the manifest JSON to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Save a completed crawl's page list under a name
    Save {
        crawl_id: i64,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "local")]
        user: String,
    },

    /// Delete a crawl with its pages, assets and logs
    Delete { crawl_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    let service = CrawlService::open(config).context("failed to open crawl database")?;

    match cli.command {
        Command::Crawl {
            seed,
            depth,
            user,
            images,
            no_css,
            no_nav,
            ignore_robots,
        } => {
            let options = CrawlOptions {
                download_images: images,
                preserve_css: !no_css,
                preserve_nav: !no_nav,
                respect_robots: !ignore_robots,
            };
            handle_crawl(&service, &user, &seed, depth, options).await
        }
        Command::Status { crawl_id, logs } => {
            let report = service.get_crawl_status(crawl_id)?;
            print!("{}", format_status_report(&report, logs));
            Ok(())
        }
        Command::Stats { crawl_id } => handle_stats(&service, crawl_id),
        Command::List { user } => {
            let crawls = service.list_crawls(&user)?;
            if crawls.is_empty() {
                println!("No crawls for {}", user);
            }
            for crawl in crawls {
                println!(
                    "{:>5}  {:<12} {:>5} pages  {}",
                    crawl.id, crawl.status, crawl.page_count, crawl.seed_url
                );
            }
            Ok(())
        }
        Command::Convert { crawl_id, out } => handle_convert(&service, crawl_id, out),
        Command::Save {
            crawl_id,
            name,
            user,
        } => {
            let id = service.save_site(crawl_id, &user, &name)?;
            println!("✓ Saved crawl {} as '{}' (saved site {})", crawl_id, name, id);
            Ok(())
        }
        Command::Delete { crawl_id } => {
            service.delete_crawl(crawl_id).await?;
            println!("✓ Deleted crawl {}", crawl_id);
            Ok(())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_ferry=info,ferry=info,warn"),
            1 => EnvFilter::new("site_ferry=debug,ferry=debug,info"),
            2 => EnvFilter::new("site_ferry=trace,ferry=trace,debug"),
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

/// Runs a crawl to its end; Ctrl-C cancels it
async fn handle_crawl(
    service: &CrawlService,
    user: &str,
    seed: &str,
    depth: u32,
    options: CrawlOptions,
) -> Result<()> {
    let crawl_id = service.start_crawl(user, seed, depth, options).await?;
    tracing::info!("Started crawl {} of {} (max depth {})", crawl_id, seed, depth);

    let status = tokio::select! {
        status = service.wait_for_crawl(crawl_id) => status?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling crawl {}", crawl_id);
            service.cancel_crawl(crawl_id)?;
            service.wait_for_crawl(crawl_id).await?
        }
    };

    handle_stats(service, crawl_id)?;

    match status {
        CrawlStatus::Completed => {
            println!("✓ Crawl {} completed", crawl_id);
            Ok(())
        }
        CrawlStatus::Cancelled => {
            println!("Crawl {} cancelled", crawl_id);
            Ok(())
        }
        other => {
            let report = service.get_crawl_status(crawl_id)?;
            bail!(
                "crawl {} ended as {}: {}",
                crawl_id,
                other,
                report.error.unwrap_or_default()
            )
        }
    }
}

fn handle_stats(service: &CrawlService, crawl_id: i64) -> Result<()> {
    let storage = storage::lock(service.storage())?;
    let stats = load_statistics(&*storage, crawl_id)?;
    drop(storage);
    print_statistics(&stats);
    Ok(())
}

fn handle_convert(service: &CrawlService, crawl_id: i64, out: Option<PathBuf>) -> Result<()> {
    let site_id = service.convert_site(crawl_id)?;
    let site = service.get_converted_site(site_id)?;

    if site.status != ConversionStatus::Completed {
        bail!(
            "conversion {} of crawl {} failed: {}",
            site_id,
            crawl_id,
            site.error.unwrap_or_default()
        );
    }

    println!(
        "✓ Converted crawl {} into site {} ({} pages, {} bytes, {})",
        crawl_id, site_id, site.page_count, site.size, site.framework
    );

    if let Some(path) = out {
        write_manifest(&site, &path)?;
        println!("✓ Manifest written to: {}", path.display());
    }
    Ok(())
}

