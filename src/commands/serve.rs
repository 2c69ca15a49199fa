use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use fastmirror::config::{Config, GroupConfig};
use fastmirror::loader;
use fastmirror::metrics;
use fastmirror::probe::IcmpProber;
use fastmirror::ranking::RankingEngine;
use fastmirror::sampler::HttpSampler;
use fastmirror::scheduler::RefreshScheduler;
use fastmirror::selection::SelectionStore;
use fastmirror::server::{AppState, MirrorServer};

use super::fatal;

/// Command-line overrides for `serve`
#[derive(Debug, Default)]
pub struct ServeParams {
    pub file: Option<PathBuf>,
    pub threads: Option<usize>,
    pub count: Option<u16>,
    pub timeout: Option<u64>,
    pub port: Option<u16>,
}

impl ServeParams {
    /// Apply the overrides given on the command line
    pub fn apply(self, config: &mut Config) {
        if let Some(file) = self.file {
            match config.groups.iter_mut().find(|g| g.name == "all") {
                Some(group) => group.file = file,
                None => config.groups.push(GroupConfig::new("all", file, false)),
            }
        }
        if let Some(threads) = self.threads {
            config.sampler.concurrency = threads;
        }
        if let Some(count) = self.count {
            config.probe.count = count;
        }
        if let Some(timeout) = self.timeout {
            config.probe.timeout_secs = timeout;
        }
        if let Some(port) = self.port {
            config.server.bind_address.set_port(port);
        }
    }
}

/// Refresh mirror selections and serve redirects until Ctrl+C
pub async fn serve(mut config: Config, params: ServeParams) -> Result<()> {
    params.apply(&mut config);
    config.validate().map_err(|e| fatal("Invalid configuration", e))?;

    println!("Starting fastmirror");
    println!("===================");
    println!("  Bind: {}", config.server.bind_address);
    println!("  Refresh Interval: {}s", config.refresh.interval_secs);
    println!(
        "  Probe: {} packet(s), {}s timeout",
        config.probe.count, config.probe.timeout_secs
    );
    println!("  Download Threads: {}", config.sampler.concurrency);
    println!("  Rank By: {}", config.ranking.rank_by.as_str());
    for group in &config.groups {
        println!("  Group {}: {}", group.name, group.file.display());
    }
    println!();

    metrics::init_metrics();

    let groups =
        loader::load_groups(&config.groups).map_err(|e| fatal("Failed to load domain lists", e))?;

    let prober =
        IcmpProber::new(&config.probe).map_err(|e| fatal("Failed to open ICMP socket", e))?;
    let sampler =
        HttpSampler::new(&config.sampler).map_err(|e| fatal("Failed to build HTTP client", e))?;
    let engine = RankingEngine::new(
        Arc::new(prober),
        Arc::new(sampler),
        config.sampler.concurrency,
        config.ranking.rank_by,
    );

    let store = Arc::new(SelectionStore::new());
    let group_names: Vec<String> = groups.iter().map(|g| g.name.clone()).collect();
    let scheduler = Arc::new(RefreshScheduler::new(
        Arc::new(engine),
        Arc::clone(&store),
        groups,
        config.refresh_interval(),
    ));

    println!("Measuring mirrors...");
    let refresh = Arc::clone(&scheduler).start().await;
    for (group, record) in store.snapshot() {
        println!("  {group}: {}", record.host);
    }
    if !store.has_all(group_names.iter().map(String::as_str)) {
        println!(
            "  {} of {} group(s) have no mirror yet and answer 503",
            group_names.len() - store.len(),
            group_names.len()
        );
    }
    println!();

    let state = AppState::new(
        store,
        group_names,
        config.redirect.clone(),
        config.server.retry_after_secs,
    );
    let server = MirrorServer::new(config.server.clone(), state);

    println!("Endpoints:");
    println!("  GET /{{group}}/https://<host>/<path> - Redirect to the selected mirror");
    println!("  GET /health                        - Selection per group");
    println!("  GET /health/ready                  - Readiness probe");
    println!("  GET /metrics                       - Prometheus metrics endpoint");
    println!();
    println!("Listening on http://{}", server.bind_address());
    println!("Press Ctrl+C to stop.\n");

    let result = server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await;

    scheduler.stop();
    if let Err(e) = refresh.await {
        tracing::warn!(error = %e, "refresh loop ended abnormally");
    }

    result.map_err(|e| fatal("Redirect server failed", e))?;
    println!("fastmirror stopped.");
    Ok(())
}
