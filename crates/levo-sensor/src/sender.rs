// Copyright 2025-Present Levo.ai, Inc. https://levo.ai/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::trace::TraceRecord;

/// Collector ingestion path appended to the configured base URL.
const COLLECTOR_PATH: &str = "1.0/traces";
/// Header carrying the configured organization identifier.
const ORGANIZATION_ID_HEADER: &str = "x-levo-organization-id";
/// Header propagating the captured request correlation identifier.
const REQUEST_ID_HEADER: &str = "X-Request-ID";
/// Base unit for the exponential retry backoff.
const BACKOFF_BASE_MS: u64 = 100;
/// Upper bound on the random jitter added to each retry delay.
const MAX_JITTER_MS: u64 = 1_000;
/// Worker threads on the delivery runtime.
const DELIVERY_WORKER_THREADS: usize = 2;
/// In-flight delivery bound; excess traces are dropped, never queued.
const MAX_IN_FLIGHT_DELIVERIES: usize = 64;

/// Errors raised while constructing a [`TraceSender`].
#[derive(Debug, Error)]
pub enum SenderError {
    #[error("invalid collector endpoint {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
    #[error("failed to start delivery runtime: {0}")]
    Runtime(std::io::Error),
}

/// One failed delivery attempt. Internal: attempts are logged and retried,
/// never surfaced to the caller.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("collector responded with status {0}")]
    Status(StatusCode),
}

/// Asynchronous, fire-and-forget delivery of trace records.
///
/// Delivery runs on a small runtime owned by the sender, so scheduling a
/// send never blocks the host request path and works from synchronous hosts.
/// Outcomes are reported only through logs: the caller cannot observe
/// success or failure, and exhausted retries drop the record.
pub struct TraceSender {
    client: reqwest::Client,
    endpoint: Url,
    organization_id: Option<String>,
    max_retries: u32,
    runtime: Runtime,
    permits: Arc<Semaphore>,
}

impl TraceSender {
    pub fn new(config: &Config) -> Result<TraceSender, SenderError> {
        let endpoint = collector_url(&config.collector_url)?;
        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(SenderError::Client)?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(DELIVERY_WORKER_THREADS)
            .thread_name("levo-sensor-delivery")
            .enable_all()
            .build()
            .map_err(SenderError::Runtime)?;

        Ok(TraceSender {
            client,
            endpoint,
            organization_id: config.organization_id.clone(),
            max_retries: config.max_retries,
            runtime,
            permits: Arc::new(Semaphore::new(MAX_IN_FLIGHT_DELIVERIES)),
        })
    }

    /// Schedules delivery of one record and returns immediately.
    ///
    /// When the in-flight bound is reached the record is dropped with a
    /// warning instead of queueing behind a slow collector.
    pub fn send_async(&self, record: TraceRecord, request_id: Option<String>) {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("delivery capacity exhausted, dropping trace");
                return;
            }
        };

        let payload = match serde_json::to_vec(&[&record]) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                error!(error = %e, "error serializing trace, dropping record");
                return;
            }
        };

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let organization_id = self.organization_id.clone();
        let max_retries = self.max_retries;

        self.runtime.spawn(async move {
            let _permit = permit;
            deliver(
                &client,
                &endpoint,
                organization_id.as_deref(),
                request_id.as_deref(),
                payload,
                max_retries,
            )
            .await;
        });
    }
}

/// Runs the attempt/backoff state machine until success or exhaustion.
async fn deliver(
    client: &reqwest::Client,
    endpoint: &Url,
    organization_id: Option<&str>,
    request_id: Option<&str>,
    payload: Bytes,
    max_retries: u32,
) {
    for attempt in 1..=max_retries {
        if attempt > 1 {
            tokio::time::sleep(backoff_delay(attempt - 1)).await;
        }

        match attempt_send(client, endpoint, organization_id, request_id, &payload).await {
            Ok(status) => {
                debug!(%status, attempt, "trace delivered");
                return;
            }
            Err(e) => {
                error!(attempt, max_retries, error = %e, "error sending trace");
            }
        }
    }
    error!(
        attempts = max_retries,
        endpoint = %endpoint,
        "trace delivery exhausted all attempts, dropping record"
    );
}

async fn attempt_send(
    client: &reqwest::Client,
    endpoint: &Url,
    organization_id: Option<&str>,
    request_id: Option<&str>,
    payload: &Bytes,
) -> Result<StatusCode, AttemptError> {
    let mut request = client
        .post(endpoint.clone())
        .header(CONTENT_TYPE, "application/json")
        .body(payload.clone());
    if let Some(org) = organization_id {
        request = request.header(ORGANIZATION_ID_HEADER, org);
    }
    if let Some(id) = request_id {
        request = request.header(REQUEST_ID_HEADER, id);
    }

    let response = request.send().await.map_err(AttemptError::Transport)?;
    let status = response.status();
    if status.is_success() {
        Ok(status)
    } else {
        Err(AttemptError::Status(status))
    }
}

/// Appends the collector path to the base URL with exactly one separating
/// slash, however the base URL is written.
fn collector_url(base: &str) -> Result<Url, SenderError> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), COLLECTOR_PATH);
    Url::parse(&joined).map_err(|e| SenderError::InvalidEndpoint {
        url: base.to_string(),
        reason: e.to_string(),
    })
}

/// Delay before retry number `retry` (1-based): an exponentially growing
/// step plus random jitter bounded by both the step and a fixed window.
/// The jitter stays strictly below the step, so consecutive delays are
/// strictly increasing.
fn backoff_delay(retry: u32) -> Duration {
    let step = BACKOFF_BASE_MS.saturating_mul(1_u64 << retry.min(10));
    let jitter_bound = step.min(MAX_JITTER_MS).max(1);
    let jitter = rand::thread_rng().gen_range(0..jitter_bound);
    Duration::from_millis(step.saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_url_normalizes_the_separating_slash() {
        let plain = collector_url("https://collector.levo.ai").unwrap();
        let trailing = collector_url("https://collector.levo.ai/").unwrap();
        let doubled = collector_url("https://collector.levo.ai//").unwrap();
        assert_eq!(plain.as_str(), "https://collector.levo.ai/1.0/traces");
        assert_eq!(plain, trailing);
        assert_eq!(plain, doubled);
    }

    #[test]
    fn collector_url_rejects_garbage() {
        assert!(matches!(
            collector_url("not a url"),
            Err(SenderError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn backoff_grows_strictly_and_respects_the_jitter_window() {
        for _ in 0..500 {
            let delays: Vec<Duration> = (1_u32..=5).map(backoff_delay).collect();
            for pair in delays.windows(2) {
                assert!(pair[0] < pair[1], "delays must strictly increase: {pair:?}");
            }
            for (i, delay) in delays.iter().enumerate() {
                let step = BACKOFF_BASE_MS * (1_u64 << (i + 1));
                let ceiling = step + step.min(MAX_JITTER_MS);
                assert!(delay.as_millis() as u64 >= step);
                assert!((delay.as_millis() as u64) < ceiling.max(step + 1));
            }
        }
    }

    #[test]
    fn sender_construction_requires_a_valid_endpoint() {
        let config = Config::new("");
        assert!(TraceSender::new(&config).is_err());

        let config = Config::new("https://collector.levo.ai");
        assert!(TraceSender::new(&config).is_ok());
    }
}
