//! Integration tests for HttpSampler using wiremock
//!
//! These tests validate concurrent download timing against mock servers.

use fastmirror::config::SamplerConfig;
use fastmirror::sampler::{HttpSampler, SampleError, ThroughputSampler};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sampler_config() -> SamplerConfig {
    SamplerConfig {
        scheme: "http".to_string(),
        reference_path: "/ref/7zr.exe".to_string(),
        timeout_secs: 5,
        ..Default::default()
    }
}

/// Every attempt hits the reference resource
#[tokio::test]
async fn test_sample_issues_concurrent_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ref/7zr.exe"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 4096])
                .set_delay(Duration::from_millis(20)),
        )
        .expect(8)
        .mount(&mock_server)
        .await;

    let sampler = HttpSampler::new(&sampler_config()).unwrap();
    let host = mock_server.address().to_string();

    let mean = sampler.sample(&host, 8).await.unwrap();
    assert!(mean >= 20, "mean {mean}ms should include the response delay");
}

/// HTTP error statuses still count as completed downloads
#[tokio::test]
async fn test_error_status_counts_as_attempt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ref/7zr.exe"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let sampler = HttpSampler::new(&sampler_config()).unwrap();
    let host = mock_server.address().to_string();

    assert!(sampler.sample(&host, 2).await.is_ok());
}

/// Connection failures on every attempt fail the sample
#[tokio::test]
async fn test_all_attempts_failed() {
    let sampler = HttpSampler::new(&sampler_config()).unwrap();

    let result = sampler.sample("127.0.0.1:1", 4).await;

    match result {
        Err(SampleError::AllAttemptsFailed { host, attempts }) => {
            assert_eq!(host, "127.0.0.1:1");
            assert_eq!(attempts, 4);
        }
        other => panic!("expected AllAttemptsFailed, got {other:?}"),
    }
}

/// Attempts slower than the client timeout are failures
#[tokio::test]
async fn test_timeout_is_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let config = SamplerConfig {
        timeout_secs: 1,
        ..sampler_config()
    };
    let sampler = HttpSampler::new(&config).unwrap();
    let host = mock_server.address().to_string();

    assert!(matches!(
        sampler.sample(&host, 2).await,
        Err(SampleError::AllAttemptsFailed { .. })
    ));
}
