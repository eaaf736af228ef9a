use crate::cmd::UpstreamArgs;
use crate::modules::{
    aggregator::{ContestAggregator, ContestListing, NamePattern},
    service::within_deadline,
};
use anyhow::{Context, Result};
use clap::Args;
use codeforces_hub_libs::CodeforcesApi;
use regex::Regex;
use std::sync::Arc;
use tokio::time::Duration;

#[derive(Debug, Args)]
pub struct ContestsArgs {
    /// Substring the contest name must contain, e.g. "Div. 2"
    #[arg(long, default_value = "")]
    category: String,
    /// Regular expression the contest name must match; takes the place of --category
    #[arg(long, conflicts_with = "category")]
    pattern: Option<String>,
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    limit: i64,
    #[command(flatten)]
    upstream: UpstreamArgs,
}

pub async fn run(args: ContestsArgs) -> Result<()> {
    let listing = fetch(&args).await?;

    for warning in listing.warnings.iter() {
        tracing::warn!("{}", warning);
    }
    tracing::info!("{} contests listed", listing.contests.len());
    println!("{}", serde_json::to_string_pretty(&listing)?);

    Ok(())
}

async fn fetch(args: &ContestsArgs) -> Result<ContestListing> {
    let listing = match &args.pattern {
        Some(pattern) => {
            let pattern = Regex::new(pattern).with_context(|| {
                let message = format!("invalid contest name pattern [{}]", pattern);
                tracing::error!(message);
                message
            })?;
            list_by_pattern(
                Arc::new(args.upstream.client()?),
                pattern,
                args.limit,
                args.upstream.max_concurrency,
                args.upstream.service_config().deadline,
            )
            .await
        }
        None => {
            let service = args.upstream.service()?;
            service
                .within_deadline(service.list_contests(&args.category, args.limit))
                .await
        }
    };

    listing.with_context(|| {
        let message = "failed to list contests";
        tracing::error!(message);
        message
    })
}

async fn list_by_pattern(
    api: Arc<dyn CodeforcesApi>,
    pattern: Regex,
    limit: i64,
    max_concurrency: usize,
    deadline: Duration,
) -> codeforces_hub_libs::Result<ContestListing> {
    let aggregator = ContestAggregator::new(api, max_concurrency);
    let category = NamePattern(pattern);

    within_deadline(
        deadline,
        aggregator.list_contests_by_category(&category, limit),
    )
    .await
}
