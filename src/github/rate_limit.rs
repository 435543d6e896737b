use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{DocdexError, Result};

pub const GITHUB_API_HOST: &str = "api.github.com";

/// Quota snapshot for one host, fed by the rate-limit response headers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitState {
    pub fn update_from_headers(&mut self, headers: &HeaderMap) {
        if let Some(remaining) = header_number(headers, "x-ratelimit-remaining") {
            self.remaining = Some(remaining);
        }
        if let Some(epoch) = header_number(headers, "x-ratelimit-reset") {
            self.reset_at = Utc.timestamp_opt(epoch as i64, 0).single();
        }
    }

    /// How long to hold off before the next request, if the quota is
    /// spent and the reset lies in the future.
    pub fn wait_duration(&self, now: DateTime<Utc>) -> Option<Duration> {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset)) if reset > now => {
                Some((reset - now).to_std().unwrap_or(Duration::ZERO))
            }
            _ => None,
        }
    }

    fn exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[derive(Default)]
struct HostGate {
    state: Mutex<RateLimitState>,
}

/// Serializes outbound requests per gated host and honors the quota the
/// host reports: when `remaining` hits zero the gate sleeps until the
/// advertised reset before sending, and a 429 (or a 403 carrying an
/// exhausted quota) is retried after the same wait. Requests to hosts
/// outside the gated set pass straight through.
pub struct RateLimiter {
    gates: DashMap<String, Arc<HostGate>>,
    gated_hosts: Vec<String>,
}

impl RateLimiter {
    pub fn new(gated_hosts: Vec<String>) -> Self {
        Self {
            gates: DashMap::new(),
            gated_hosts,
        }
    }

    pub fn github() -> Self {
        Self::new(vec![GITHUB_API_HOST.to_string()])
    }

    fn gate_for(&self, host: &str) -> Arc<HostGate> {
        self.gates
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(HostGate::default()))
            .clone()
    }

    pub async fn execute(
        &self,
        client: &reqwest::Client,
        request: reqwest::Request,
    ) -> Result<reqwest::Response> {
        let host = request.url().host_str().unwrap_or("").to_string();
        if !self.gated_hosts.iter().any(|gated| gated == &host) {
            return Ok(client.execute(request).await?);
        }

        let gate = self.gate_for(&host);
        // one request in flight per gated host; the lock spans the wait,
        // the send, and the header update
        let mut state = gate.state.lock().await;
        loop {
            if let Some(wait) = state.wait_duration(Utc::now()) {
                debug!(
                    host = %host,
                    wait_ms = wait.as_millis() as u64,
                    "rate limit exhausted, sleeping until reset"
                );
                tokio::time::sleep(wait).await;
            }

            let attempt = request.try_clone().ok_or_else(|| DocdexError::GitHub {
                status: None,
                message: "cannot retry a request with a streaming body".to_string(),
            })?;
            let response = client.execute(attempt).await?;
            state.update_from_headers(response.headers());

            let status = response.status();
            let limited = status == StatusCode::TOO_MANY_REQUESTS
                || (status == StatusCode::FORBIDDEN && state.exhausted());
            if limited {
                warn!(host = %host, status = status.as_u16(), "rate limited, retrying");
                if state.wait_duration(Utc::now()).is_none() {
                    // no usable reset information, back off a beat
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                continue;
            }
            return Ok(response);
        }
    }
}
