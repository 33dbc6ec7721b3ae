//! Polite HTTP fetching: per-host token buckets, robots.txt, and bounded
//! retries with exponential backoff.
//!
//! One [`PoliteFetcher`] instance is shared by discovery and ingestion so
//! a host sees a single request budget regardless of which stage is
//! talking to it.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use url::Url;

use scout_core::error::AppError;
use scout_core::traits::{FetchedPage, PageFetcher};

use crate::robots::RobotsTxt;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Sustained per-host request rate (requests per second).
    pub requests_per_second: u32,
    /// Per-host burst allowance.
    pub burst: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "scout-bot/1.0".to_string(),
            timeout: Duration::from_secs(15),
            requests_per_second: 1,
            burst: 2,
        }
    }
}

/// Per-host politeness state: a token bucket plus the next instant a
/// request may go out after a backoff.
struct HostPolicy {
    limiter: DirectRateLimiter,
    next_allowed: Mutex<Option<Instant>>,
}

impl HostPolicy {
    fn new(config: &FetchConfig) -> Self {
        let rps = NonZeroU32::new(config.requests_per_second.max(1))
            .unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst.max(1)).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(burst);
        Self {
            limiter: RateLimiter::direct(quota),
            next_allowed: Mutex::new(None),
        }
    }

    fn push_back(&self, delay: Duration) {
        let candidate = Instant::now() + delay;
        let mut next = self.next_allowed.lock().expect("host policy mutex");
        if next.is_none_or(|current| candidate > current) {
            *next = Some(candidate);
        }
    }

    fn backoff_remaining(&self) -> Option<Duration> {
        let next = (*self.next_allowed.lock().expect("host policy mutex"))?;
        next.checked_duration_since(Instant::now())
    }
}

/// HTTP fetcher that is polite per host and cancellable everywhere.
#[derive(Clone)]
pub struct PoliteFetcher {
    client: Client,
    config: Arc<FetchConfig>,
    hosts: Arc<Mutex<HashMap<String, Arc<HostPolicy>>>>,
    robots: Arc<tokio::sync::Mutex<HashMap<String, Arc<RobotsTxt>>>>,
    cancel: CancellationToken,
}

impl PoliteFetcher {
    pub fn new(config: FetchConfig, cancel: CancellationToken) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            config: Arc::new(config),
            hosts: Arc::new(Mutex::new(HashMap::new())),
            robots: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            cancel,
        })
    }

    fn host_policy(&self, host: &str) -> Arc<HostPolicy> {
        let key = if host.is_empty() { "default" } else { host };
        let mut hosts = self.hosts.lock().expect("host map mutex");
        hosts
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(HostPolicy::new(&self.config)))
            .clone()
    }

    /// Honor any backoff window, then take a token from the host's bucket.
    async fn wait_for_host(&self, policy: &HostPolicy) -> Result<(), AppError> {
        while let Some(remaining) = policy.backoff_remaining() {
            tokio::select! {
                () = tokio::time::sleep(remaining) => {}
                () = self.cancel.cancelled() => return Err(AppError::Cancelled),
            }
        }
        tokio::select! {
            () = policy.limiter.until_ready() => Ok(()),
            () = self.cancel.cancelled() => Err(AppError::Cancelled),
        }
    }

    /// Fetch and cache robots.txt for a host. Failures fail open: a host
    /// that cannot serve robots.txt does not block the crawl.
    async fn robots_for(&self, url: &Url, host: &str) -> Arc<RobotsTxt> {
        {
            let cache = self.robots.lock().await;
            if let Some(robots) = cache.get(host) {
                return robots.clone();
            }
        }

        let robots_url = format!(
            "{}://{}/robots.txt",
            url.scheme(),
            url.host_str().unwrap_or(host)
        );
        let policy = self.host_policy(host);
        let robots = if self.wait_for_host(&policy).await.is_ok() {
            match self.client.get(&robots_url).send().await {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(body) => Arc::new(RobotsTxt::parse(&body)),
                    Err(_) => Arc::new(RobotsTxt::default()),
                },
                _ => Arc::new(RobotsTxt::default()),
            }
        } else {
            Arc::new(RobotsTxt::default())
        };

        self.robots
            .lock()
            .await
            .insert(host.to_string(), robots.clone());
        robots
    }

    async fn fetch_inner(&self, raw_url: &str) -> Result<FetchedPage, AppError> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let url = parse_target(raw_url)?;
        let host = host_key(&url);

        let robots = self.robots_for(&url, &host).await;
        if !robots.is_allowed(&self.config.user_agent, url.path()) {
            return Err(AppError::RobotsDisallowed(url.to_string()));
        }

        let policy = self.host_policy(&host);
        let mut last_status = 0u16;

        for attempt in 0..MAX_ATTEMPTS {
            self.wait_for_host(&policy).await?;

            let response = match self.client.get(url.clone()).send().await {
                Ok(resp) => resp,
                Err(e) if e.is_timeout() => {
                    return Err(AppError::Timeout(self.config.timeout.as_secs()));
                }
                Err(e) if e.is_connect() => {
                    return Err(AppError::NetworkError(format!("connection failed: {e}")));
                }
                Err(e) => return Err(AppError::HttpError(e.to_string())),
            };

            let status = response.status().as_u16();
            if status == 429 || (500..=599).contains(&status) {
                last_status = status;
                let backoff = Duration::from_millis(BACKOFF_BASE_MS * (1 << attempt));
                tracing::debug!(%url, status, backoff_ms = backoff.as_millis() as u64, "backing off");
                policy.push_back(backoff);
                continue;
            }
            if status >= 400 {
                return Err(AppError::FetchError {
                    status,
                    message: format!("HTTP {status} for {url}"),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| AppError::HttpError(format!("failed to read body: {e}")))?;
            return Ok(FetchedPage { body, status });
        }

        Err(AppError::FetchError {
            status: last_status,
            message: format!("retry budget exhausted for {url}"),
        })
    }
}

impl PageFetcher for PoliteFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, AppError> {
        self.fetch_inner(url).await
    }
}

fn parse_target(raw: &str) -> Result<Url, AppError> {
    if raw.is_empty() {
        return Err(AppError::UrlError("empty url".into()));
    }
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{raw}"))
            .map_err(|e| AppError::UrlError(format!("{raw}: {e}"))),
        Err(e) => Err(AppError::UrlError(format!("{raw}: {e}"))),
    }
}

fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or("default").to_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}
