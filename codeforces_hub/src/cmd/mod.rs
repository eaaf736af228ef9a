pub mod contests;
pub mod problem;
pub mod server;

use crate::modules::service::{ContestService, ServiceConfig};
use anyhow::{Context, Result};
use clap::Args;
use codeforces_hub_libs::{ClientConfig, CodeforcesClient, RetryPolicy};
use std::sync::Arc;
use tokio::time::Duration;

/// Upstream and service settings shared by every subcommand.
#[derive(Debug, Args)]
pub struct UpstreamArgs {
    #[arg(long, env = "CODEFORCES_URL", default_value = "https://codeforces.com")]
    pub codeforces_url: String,
    #[arg(long, env = "UPSTREAM_TIMEOUT_MS", default_value_t = 10000)]
    pub upstream_timeout_ms: u64,
    #[arg(long, env = "UPSTREAM_MAX_RETRIES", default_value_t = 2)]
    pub upstream_max_retries: u32,
    #[arg(long, env = "UPSTREAM_RETRY_BASE_MS", default_value_t = 200)]
    pub upstream_retry_base_ms: u64,
    #[arg(long, env = "UPSTREAM_MIN_INTERVAL_MS", default_value_t = 0)]
    pub upstream_min_interval_ms: u64,
    #[arg(long, env = "MAX_CONCURRENCY", default_value_t = 4)]
    pub max_concurrency: usize,
    #[arg(long, env = "LISTING_TTL_SECS", default_value_t = 60)]
    pub listing_ttl_secs: u64,
    #[arg(long, env = "PROBLEM_TTL_SECS", default_value_t = 3600)]
    pub problem_ttl_secs: u64,
    #[arg(long, env = "CACHE_CAPACITY", default_value_t = 1024)]
    pub cache_capacity: usize,
    #[arg(long, env = "REQUEST_DEADLINE_MS", default_value_t = 15000)]
    pub request_deadline_ms: u64,
}

impl UpstreamArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_millis(self.upstream_timeout_ms),
            retry: RetryPolicy {
                max_retries: self.upstream_max_retries,
                base_delay: Duration::from_millis(self.upstream_retry_base_ms),
                ..RetryPolicy::default()
            },
            min_interval: Duration::from_millis(self.upstream_min_interval_ms),
            ..ClientConfig::default()
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            max_concurrency: self.max_concurrency,
            listing_ttl: Duration::from_secs(self.listing_ttl_secs),
            problem_ttl: Duration::from_secs(self.problem_ttl_secs),
            cache_capacity: self.cache_capacity,
            deadline: Duration::from_millis(self.request_deadline_ms),
        }
    }

    pub fn client(&self) -> Result<CodeforcesClient> {
        CodeforcesClient::new(&self.codeforces_url, self.client_config()).with_context(|| {
            let message = format!(
                "couldn't create Codeforces client. check the value of CODEFORCES_URL [{}]",
                self.codeforces_url
            );
            tracing::error!(message);
            message
        })
    }

    pub fn service(&self) -> Result<Arc<ContestService>> {
        let client = self.client()?;
        tracing::info!("Connect to Codeforces at {}", self.codeforces_url);

        Ok(Arc::new(ContestService::new(
            Arc::new(client),
            self.service_config(),
        )))
    }
}
