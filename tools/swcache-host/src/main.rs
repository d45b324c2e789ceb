//! Host for the static-cache service worker.
//!
//! Installs the worker against a live origin and routes requests through it.
//!
//! ## Usage
//!
//! ```bash
//! # Pre-cache the configured assets and list what was stored
//! swcache-host --config swcache.toml install
//!
//! # Install, activate, then serve requests (cache first, network on a miss)
//! swcache-host --scope https://example.com/ --asset / --asset /app.css fetch / /about
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use swcache_common::{init_logging, LogConfig, LogFormat};
use swcache_net::{Request, ResourceLoader};
use swcache_sw::{
    CacheStorage, ResponseSource, ServiceWorkerError, ServiceWorkerHost, ServiceWorkerState,
    StaticCacheWorker, WorkerConfig, WorkerGlobalScope,
};
use tracing::debug;

#[derive(Parser)]
#[command(name = "swcache-host")]
#[command(about = "Run the static-cache service worker against a live origin")]
struct Cli {
    /// Worker config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Scope URL that asset paths resolve against
    #[arg(long, global = true)]
    scope: Option<String>,
    /// Name of the cache assets are stored in
    #[arg(long, global = true)]
    cache_name: Option<String>,
    /// Asset to pre-cache; repeat to list several (replaces the configured list)
    #[arg(long = "asset", global = true)]
    assets: Vec<String>,
    /// Fail install after this many seconds
    #[arg(long, global = true)]
    install_timeout: Option<u64>,
    /// Log format: pretty, compact or json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
    /// Debug logging for the swcache crates
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the worker and list the cached requests
    Install,

    /// Install and activate the worker, then serve each path through it
    Fetch {
        /// Paths or URLs to request
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

/// Outcome of an install.
#[derive(Debug, Serialize)]
struct InstallReport {
    worker: String,
    state: ServiceWorkerState,
    cache: String,
    entries: Vec<String>,
}

/// Outcome of one request routed through the worker.
#[derive(Debug, Serialize)]
struct FetchReport {
    url: String,
    status: Option<u16>,
    source: Option<&'static str>,
    bytes: usize,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(log_config(&cli)?)?;

    let config = resolve_config(&cli)?;
    let (host, caches) = build_host(&config)?;

    match cli.command {
        Commands::Install => {
            host.install().await?;
            let cache = caches.open(&config.cache_name).await;
            let report = InstallReport {
                worker: host.id().to_string(),
                state: host.state().await,
                cache: config.cache_name.clone(),
                entries: cache.keys().await.iter().map(|k| k.to_string()).collect(),
            };

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} {} into '{}' ({} entries):",
                    report.worker,
                    report.state,
                    report.cache,
                    report.entries.len()
                );
                for key in &report.entries {
                    println!("  {key}");
                }
            }
        }

        Commands::Fetch { paths } => {
            host.start().await?;

            let mut reports = Vec::with_capacity(paths.len());
            for path in &paths {
                reports.push(serve(&host, path).await);
            }

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    match (&report.error, report.status, report.source) {
                        (Some(error), _, _) => println!("ERR  {}  {error}", report.url),
                        (None, Some(status), Some(source)) => println!(
                            "{status}  {source:<7}  {}  ({} bytes)",
                            report.url, report.bytes
                        ),
                        _ => println!("???  {}", report.url),
                    }
                }
            }

            if reports.iter().any(|r| r.error.is_some()) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn log_config(cli: &Cli) -> Result<LogConfig, Box<dyn std::error::Error>> {
    let base = if cli.verbose {
        LogConfig::debug()
    } else {
        LogConfig::default()
    };
    let mut config = base.with_env()?;
    if cli.verbose && config.filter.is_none() {
        config = config.with_filter("swcache_sw=debug,swcache_net=debug,swcache_host=debug");
    }
    if let Some(format) = cli.log_format {
        config = config.with_format(format);
    }
    Ok(config)
}

/// Config file (or defaults) with command-line overrides applied.
fn resolve_config(cli: &Cli) -> Result<WorkerConfig, ServiceWorkerError> {
    let mut config = match cli.config {
        Some(ref path) => WorkerConfig::load(path)?,
        None => WorkerConfig::default(),
    };

    if let Some(ref scope) = cli.scope {
        config.scope = scope.clone();
    }
    if let Some(ref cache_name) = cli.cache_name {
        config.cache_name = cache_name.clone();
    }
    if !cli.assets.is_empty() {
        config.assets = cli.assets.clone();
    }
    if let Some(secs) = cli.install_timeout {
        config.install_timeout_secs = Some(secs);
    }

    config.validate()?;
    debug!(?config, "Resolved worker config");
    Ok(config)
}

fn build_host(
    config: &WorkerConfig,
) -> Result<(ServiceWorkerHost, CacheStorage), ServiceWorkerError> {
    let loader = ResourceLoader::new(config.loader_config())?;
    let caches = CacheStorage::new();
    let global = WorkerGlobalScope::new(config.scope_url()?, caches.clone(), Arc::new(loader));
    let table = StaticCacheWorker::from_config(config).dispatch_table();

    let mut host = ServiceWorkerHost::new(global, table);
    if let Some(timeout) = config.install_timeout() {
        host = host.with_install_timeout(timeout);
    }
    Ok((host, caches))
}

async fn serve(host: &ServiceWorkerHost, path: &str) -> FetchReport {
    let url = match host.global().resolve(path) {
        Ok(url) => url,
        Err(err) => {
            return FetchReport {
                url: path.to_string(),
                status: None,
                source: None,
                bytes: 0,
                error: Some(err.to_string()),
            }
        }
    };

    let request = Request::get(url.clone());
    match host.fetch(request).await {
        Ok(served) => FetchReport {
            url: url.to_string(),
            status: Some(served.response.status.as_u16()),
            source: Some(match served.source {
                ResponseSource::Cache => "cache",
                ResponseSource::Network => "network",
            }),
            bytes: served.response.bytes().len(),
            error: None,
        },
        Err(err) => FetchReport {
            url: url.to_string(),
            status: None,
            source: None,
            bytes: 0,
            error: Some(err.to_string()),
        },
    }
}
