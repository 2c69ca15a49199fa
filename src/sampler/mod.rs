//! Download throughput sampling
//!
//! The sampler fires a fixed number of simultaneous requests for the same
//! reference resource on one host and reports the mean time until response
//! headers arrive. Attempts that fail at the transport level are dropped from
//! the mean; the sample only fails when no attempt succeeded.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use crate::config::SamplerConfig;

/// Result type for sampling operations
pub type SampleResult<T> = Result<T, SampleError>;

/// Errors that can occur while sampling a host
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// Every download attempt failed
    #[error("All {attempts} download attempts against '{host}' failed")]
    AllAttemptsFailed { host: String, attempts: usize },

    /// Reference URL could not be built for the host
    #[error("Invalid reference URL: {0}")]
    InvalidUrl(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Measures mean download time of the reference resource on a host
#[async_trait]
pub trait ThroughputSampler: Send + Sync {
    /// Mean milliseconds over successful attempts out of `concurrency`
    async fn sample(&self, host: &str, concurrency: usize) -> SampleResult<u64>;
}

/// Integer mean of the successful attempt timings
///
/// Returns `None` when no attempt succeeded.
pub fn mean_of_successes<E>(attempts: &[Result<u64, E>]) -> Option<u64> {
    let (total, count) = attempts
        .iter()
        .filter_map(|a| a.as_ref().ok())
        .fold((0u64, 0u64), |(total, count), ms| (total + ms, count + 1));

    if count == 0 {
        None
    } else {
        Some(total / count)
    }
}

/// Sampler issuing HTTP GET requests with reqwest
pub struct HttpSampler {
    client: Client,
    scheme: String,
    reference_path: String,
}

impl HttpSampler {
    /// Create a sampler from configuration
    pub fn new(config: &SamplerConfig) -> SampleResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            // every attempt opens its own connection
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            client,
            scheme: config.scheme.clone(),
            reference_path: config.reference_path.clone(),
        })
    }

    /// URL of the reference resource on `host`
    pub fn reference_url(&self, host: &str) -> SampleResult<reqwest::Url> {
        let raw = format!("{}://{}{}", self.scheme, host, self.reference_path);
        reqwest::Url::parse(&raw).map_err(|e| SampleError::InvalidUrl(format!("{raw}: {e}")))
    }
}

async fn timed_attempt(client: Client, url: reqwest::Url) -> Result<u64, reqwest::Error> {
    let start = Instant::now();
    let response = client.get(url).send().await?;
    let elapsed = start.elapsed().as_millis() as u64;
    drop(response);
    Ok(elapsed)
}

#[async_trait]
impl ThroughputSampler for HttpSampler {
    async fn sample(&self, host: &str, concurrency: usize) -> SampleResult<u64> {
        let url = self.reference_url(host)?;
        let attempts = concurrency.max(1);

        let mut set = JoinSet::new();
        for _ in 0..attempts {
            set.spawn(timed_attempt(self.client.clone(), url.clone()));
        }

        let mut results = Vec::with_capacity(attempts);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(ms)) => results.push(Ok(ms)),
                Ok(Err(e)) => {
                    tracing::debug!(host, error = %e, "download attempt failed");
                    results.push(Err(()));
                }
                Err(e) => {
                    tracing::error!(host, error = %e, "download attempt task failed");
                    results.push(Err(()));
                }
            }
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        match mean_of_successes(&results) {
            Some(mean) => {
                tracing::debug!(host, mean_ms = mean, failed, attempts, "throughput sampled");
                Ok(mean)
            }
            None => Err(SampleError::AllAttemptsFailed {
                host: host.to_string(),
                attempts,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_over_partial_successes() {
        let attempts: Vec<Result<u64, ()>> = vec![Ok(10), Err(()), Ok(20), Err(()), Ok(30)];
        assert_eq!(mean_of_successes(&attempts), Some(20));
    }

    #[test]
    fn test_mean_truncates() {
        let attempts: Vec<Result<u64, ()>> = vec![Ok(10), Ok(11)];
        assert_eq!(mean_of_successes(&attempts), Some(10));
    }

    #[test]
    fn test_all_failed_has_no_mean() {
        let attempts: Vec<Result<u64, ()>> = vec![Err(()), Err(())];
        assert_eq!(mean_of_successes(&attempts), None);
        assert_eq!(mean_of_successes::<()>(&[]), None);
    }

    #[test]
    fn test_reference_url() {
        let sampler = HttpSampler::new(&SamplerConfig::default()).unwrap();
        let url = sampler.reference_url("mirror.example.com").unwrap();
        assert_eq!(
            url.as_str(),
            "https://mirror.example.com/project/sevenzip/files/7-Zip/23.01/7zr.exe?viasf=1"
        );
    }

    #[test]
    fn test_reference_url_rejects_garbage_host() {
        let sampler = HttpSampler::new(&SamplerConfig::default()).unwrap();
        assert!(matches!(
            sampler.reference_url("bad host"),
            Err(SampleError::InvalidUrl(_))
        ));
    }
}
