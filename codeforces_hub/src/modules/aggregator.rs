use codeforces_hub_libs::{
    codeforces::model::{Contest, StandingsProblem},
    CodeforcesApi, CodeforcesError, Result,
};
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Decides from a contest name whether the contest belongs to a category.
pub trait ContestCategory: Send + Sync {
    fn matches(&self, contest_name: &str) -> bool;
}

/// Substring match on the contest name, e.g. `"Div. 2"`.
///
/// Codeforces exposes no structured division data, so the name is the only signal.
#[derive(Debug, Clone)]
pub struct NameContains(pub String);

impl ContestCategory for NameContains {
    fn matches(&self, contest_name: &str) -> bool {
        contest_name.contains(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct NamePattern(pub Regex);

impl ContestCategory for NamePattern {
    fn matches(&self, contest_name: &str) -> bool {
        self.0.is_match(contest_name)
    }
}

impl<F> ContestCategory for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, contest_name: &str) -> bool {
        self(contest_name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContestSummary {
    pub contest_id: u64,
    pub contest_name: String,
    pub total_problems: usize,
    pub problem_indexes: Vec<String>,
}

impl ContestSummary {
    pub fn new(contest: &Contest, problems: Vec<StandingsProblem>) -> Self {
        let problem_indexes: Vec<String> =
            problems.into_iter().map(|problem| problem.index).collect();

        Self {
            contest_id: contest.id,
            contest_name: contest.name.clone(),
            total_problems: problem_indexes.len(),
            problem_indexes,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ContestListing {
    pub contests: Vec<ContestSummary>,
    pub warnings: Vec<String>,
}

pub fn validate_limit(limit: i64) -> Result<usize> {
    if limit > 0 {
        Ok(limit as usize)
    } else {
        Err(CodeforcesError::Validation(format!(
            "limit must be a positive integer, got {}",
            limit
        )))
    }
}

pub struct ContestAggregator {
    api: Arc<dyn CodeforcesApi>,
    max_concurrency: usize,
}

impl ContestAggregator {
    pub fn new(api: Arc<dyn CodeforcesApi>, max_concurrency: usize) -> Self {
        Self {
            api,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Lists the most recent finished contests of a category together with their problem indexes.
    ///
    /// A contest whose problem set cannot be fetched is left out and reported in `warnings`;
    /// only a failure of the contest list itself fails the whole call.
    pub async fn list_contests_by_category(
        &self,
        category: &dyn ContestCategory,
        limit: i64,
    ) -> Result<ContestListing> {
        let limit = validate_limit(limit)?;

        let selected: Vec<Contest> = self
            .api
            .fetch_contest_list()
            .await?
            .into_iter()
            .filter(|contest| contest.is_finished() && category.matches(&contest.name))
            .take(limit)
            .collect();
        tracing::info!(
            "{} contests selected, fetching problem sets with concurrency {}",
            selected.len(),
            self.max_concurrency
        );

        // `buffered` yields in input order whatever the completion order is.
        let fetched: Vec<(Contest, Result<Vec<StandingsProblem>>)> = stream::iter(selected)
            .map(|contest| async move {
                let problems = self.api.fetch_standings_header(contest.id).await;
                (contest, problems)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut listing = ContestListing::default();
        for (contest, problems) in fetched {
            match problems {
                Ok(problems) => listing
                    .contests
                    .push(ContestSummary::new(&contest, problems)),
                Err(e) => {
                    tracing::warn!("contest {} omitted from listing: {}", contest.id, e);
                    listing
                        .warnings
                        .push(format!("contest {}: {}", contest.id, e));
                }
            }
        }

        Ok(listing)
    }
}
