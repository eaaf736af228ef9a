use crate::cmd::UpstreamArgs;
use crate::modules::normalizer::{Problem, ProblemNormalizer};
use anyhow::{Context, Result};
use clap::Args;
use codeforces_hub_libs::codeforces::{
    client::{validate_contest_id, validate_problem_index},
    model::RawProblem,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct ProblemArgs {
    contest_id: i64,
    index: String,
    /// Normalize a saved problem page (HTML or JSON) instead of fetching it
    #[arg(long)]
    file: Option<PathBuf>,
    #[command(flatten)]
    upstream: UpstreamArgs,
}

pub async fn run(args: ProblemArgs) -> Result<()> {
    let problem = match &args.file {
        Some(path) => load(args.contest_id, &args.index, path).await?,
        None => {
            let service = args.upstream.service()?;
            service
                .within_deadline(service.problem(args.contest_id, &args.index))
                .await
                .with_context(|| {
                    let message = format!("failed to fetch problem {}{}", args.contest_id, args.index);
                    tracing::error!(message);
                    message
                })?
        }
    };

    println!("{}", serde_json::to_string_pretty(&problem)?);
    Ok(())
}

async fn load(contest_id: i64, index: &str, path: &Path) -> Result<Problem> {
    let contest_id = validate_contest_id(contest_id)?;
    validate_problem_index(index)?;

    let text = tokio::fs::read_to_string(path).await.with_context(|| {
        let message = format!("couldn't read {}", path.display());
        tracing::error!(message);
        message
    })?;

    let problem = ProblemNormalizer::new()
        .normalize(contest_id, index, &RawProblem::detect(text))
        .with_context(|| {
            let message = format!("couldn't normalize {}", path.display());
            tracing::error!(message);
            message
        })?;

    Ok(problem)
}
