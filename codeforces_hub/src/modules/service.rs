use crate::modules::{
    aggregator::{validate_limit, ContestAggregator, ContestListing, NameContains},
    normalizer::{Problem, ProblemNormalizer},
};
use codeforces_hub_libs::{
    codeforces::client::{validate_contest_id, validate_problem_index},
    CodeforcesApi, CodeforcesError, Result, TtlCache,
};
use std::{future::Future, sync::Arc};
use tokio::time::{self, Duration};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub max_concurrency: usize,
    pub listing_ttl: Duration,
    pub problem_ttl: Duration,
    pub cache_capacity: usize,
    pub deadline: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            listing_ttl: Duration::from_secs(60),
            problem_ttl: Duration::from_secs(60 * 60),
            cache_capacity: 1024,
            deadline: Duration::from_secs(15),
        }
    }
}

pub struct ContestService {
    api: Arc<dyn CodeforcesApi>,
    aggregator: ContestAggregator,
    normalizer: ProblemNormalizer,
    listings: TtlCache<(String, usize), ContestListing>,
    problems: TtlCache<(u64, String), Problem>,
    deadline: Duration,
}

impl ContestService {
    pub fn new(api: Arc<dyn CodeforcesApi>, config: ServiceConfig) -> Self {
        Self {
            aggregator: ContestAggregator::new(Arc::clone(&api), config.max_concurrency),
            api,
            normalizer: ProblemNormalizer::new(),
            listings: TtlCache::new(config.listing_ttl, config.cache_capacity),
            problems: TtlCache::new(config.problem_ttl, config.cache_capacity),
            deadline: config.deadline,
        }
    }

    /// Finished contests whose name contains `category`, most recent first.
    ///
    /// Listings with warnings are handed out but not kept, so the next call retries
    /// the contests that failed.
    pub async fn list_contests(&self, category: &str, limit: i64) -> Result<ContestListing> {
        let limit = validate_limit(limit)?;
        let key = (category.to_string(), limit);

        self.listings
            .get_or_try_insert_with_if(
                key,
                || async {
                    let category = NameContains(category.to_string());
                    self.aggregator
                        .list_contests_by_category(&category, limit as i64)
                        .await
                },
                |listing| listing.warnings.is_empty(),
            )
            .await
    }

    pub async fn problem(&self, contest_id: i64, index: &str) -> Result<Problem> {
        let contest_id = validate_contest_id(contest_id)?;
        validate_problem_index(index)?;

        self.problems
            .get_or_try_insert_with((contest_id, index.to_string()), || async {
                let raw = self.api.fetch_problem_detail(contest_id, index).await?;
                self.normalizer.normalize(contest_id, index, &raw)
            })
            .await
    }

    pub async fn within_deadline<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
        within_deadline(self.deadline, future).await
    }
}

/// Runs `future` under a per-request deadline; on expiry the future is dropped,
/// which cancels its in-flight upstream calls.
pub async fn within_deadline<T>(
    deadline: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("request exceeded the deadline of {}ms", deadline.as_millis());
            Err(CodeforcesError::Timeout)
        }
    }
}
