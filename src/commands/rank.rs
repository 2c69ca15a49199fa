use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use fastmirror::config::Config;
use fastmirror::loader;
use fastmirror::models::CandidateGroup;
use fastmirror::probe::IcmpProber;
use fastmirror::ranking::{RankedResult, RankingEngine};
use fastmirror::sampler::HttpSampler;

use super::fatal;

/// Arguments of `rank`
#[derive(Debug)]
pub struct RankParams {
    pub file: PathBuf,
    pub latency_only: bool,
    pub threads: Option<usize>,
    pub json: bool,
}

/// Measure one domain list once and print the ranking
pub async fn rank(mut config: Config, params: RankParams) -> Result<()> {
    if let Some(threads) = params.threads {
        config.sampler.concurrency = threads;
    }
    config.validate().map_err(|e| fatal("Invalid configuration", e))?;

    let hosts =
        loader::load_group(&params.file).map_err(|e| fatal("Failed to load domain list", e))?;
    let name = params
        .file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cli".to_string());
    let group = CandidateGroup::new(name, hosts, !params.latency_only);

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

    if !params.json {
        println!(
            "Measuring {} host(s) from {}, ranked by {}...",
            group.len(),
            params.file.display(),
            engine.rank_by().as_str()
        );
    }

    let ranked = engine.rank(&group).await;

    if params.json {
        println!("{}", serde_json::to_string_pretty(ranked.candidates())?);
    } else {
        print_table(&ranked);
    }

    let fastest = ranked
        .fastest()
        .map_err(|e| fatal("No reachable mirror", e))?;
    tracing::info!(group = %ranked.group(), host = %fastest.name, "fastest mirror");
    Ok(())
}

fn print_table(ranked: &RankedResult) {
    println!();
    println!("{:>4}  {:<40} {:>10} {:>12}", "#", "HOST", "LATENCY", "DOWNLOAD");
    for (i, candidate) in ranked.candidates().iter().enumerate() {
        println!(
            "{:>4}  {:<40} {:>10} {:>12}",
            i + 1,
            candidate.name,
            format_ms(candidate.latency_ms),
            format_ms(candidate.throughput_ms),
        );
    }
    if ranked.is_empty() {
        println!("  (no reachable mirror)");
    }
}

fn format_ms(value: Option<u64>) -> String {
    value.map(|ms| format!("{ms}ms")).unwrap_or_else(|| "-".to_string())
}
