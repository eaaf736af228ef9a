use async_trait::async_trait;
use codeforces_hub_libs::{
    codeforces::model::{Contest, ContestPhase, RawProblem, StandingsProblem},
    CodeforcesApi, CodeforcesError, Result,
};
use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};
use tokio::time::{self, Duration};

/// Trimmed copy of a real problem page.
pub const PROBLEM_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Problem - 4A - Codeforces</title></head>
<body><div id="pageContent"><div class="problemindexholder" problemindex="A">
<div class="ttypography"><div class="problem-statement">
<div class="header"><div class="title">A. Watermelon</div><div class="time-limit"><div class="property-title">time limit per test</div>1 second</div></div>
<div><p>One hot summer day Pete and his friend Billy decided to buy a watermelon.</p></div>
<div class="input-specification"><div class="section-title">Input</div><p>The first (and the only) input line contains integer number <span class="tex-span"><i>w</i></span>.</p></div>
<div class="output-specification"><div class="section-title">Output</div><p>Print <span class="tex-font-style-tt">YES</span>, if the boys can divide the watermelon.</p></div>
<div class="sample-tests"><div class="section-title">Examples</div><div class="sample-test"><div class="input"><pre>8</pre></div><div class="output"><pre>YES</pre></div></div></div>
<div class="note"></div>
</div></div></div></div></body></html>"#;

pub fn finished(id: u64, name: &str) -> Contest {
    Contest {
        id,
        name: String::from(name),
        phase: ContestPhase::Finished,
        start_time_seconds: Some(1_700_000_000 + id as i64),
    }
}

/// In-memory upstream counting every call it serves.
#[derive(Default)]
pub struct MockApi {
    contests: Vec<Contest>,
    contest_list_error: Option<CodeforcesError>,
    standings: HashMap<u64, Vec<StandingsProblem>>,
    standings_errors: HashMap<u64, CodeforcesError>,
    standings_delays: HashMap<u64, Duration>,
    problems: HashMap<(u64, String), Result<RawProblem>>,
    default_delay: Duration,
    contest_list_calls: AtomicUsize,
    standings_calls: AtomicUsize,
    problem_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockApi {
    pub fn new(contests: Vec<Contest>) -> Self {
        Self {
            contests,
            ..Self::default()
        }
    }

    pub fn with_contest_list_error(mut self, e: CodeforcesError) -> Self {
        self.contest_list_error = Some(e);
        self
    }

    pub fn with_standings(mut self, contest_id: u64, indexes: &[&str]) -> Self {
        let problems = indexes
            .iter()
            .map(|index| StandingsProblem {
                index: index.to_string(),
                name: None,
            })
            .collect();
        self.standings.insert(contest_id, problems);
        self
    }

    pub fn with_standings_error(mut self, contest_id: u64, e: CodeforcesError) -> Self {
        self.standings_errors.insert(contest_id, e);
        self
    }

    pub fn with_standings_delay(mut self, contest_id: u64, delay: Duration) -> Self {
        self.standings_delays.insert(contest_id, delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn with_problem(mut self, contest_id: u64, index: &str, raw: Result<RawProblem>) -> Self {
        self.problems.insert((contest_id, index.to_string()), raw);
        self
    }

    pub fn contest_list_calls(&self) -> usize {
        self.contest_list_calls.load(Ordering::SeqCst)
    }

    pub fn standings_calls(&self) -> usize {
        self.standings_calls.load(Ordering::SeqCst)
    }

    pub fn problem_calls(&self) -> usize {
        self.problem_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.contest_list_calls() + self.standings_calls() + self.problem_calls()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn pause(&self, delay: Duration) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !delay.is_zero() {
            time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CodeforcesApi for MockApi {
    async fn fetch_contest_list(&self) -> Result<Vec<Contest>> {
        self.contest_list_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(self.default_delay).await;
        match &self.contest_list_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.contests.clone()),
        }
    }

    async fn fetch_standings_header(&self, contest_id: u64) -> Result<Vec<StandingsProblem>> {
        self.standings_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self
            .standings_delays
            .get(&contest_id)
            .copied()
            .unwrap_or(self.default_delay);
        self.pause(delay).await;

        if let Some(e) = self.standings_errors.get(&contest_id) {
            return Err(e.clone());
        }
        Ok(self.standings.get(&contest_id).cloned().unwrap_or_else(|| {
            ["A", "B", "C"]
                .iter()
                .map(|index| StandingsProblem {
                    index: index.to_string(),
                    name: None,
                })
                .collect()
        }))
    }

    async fn fetch_problem_detail(&self, contest_id: u64, index: &str) -> Result<RawProblem> {
        self.problem_calls.fetch_add(1, Ordering::SeqCst);
        self.pause(self.default_delay).await;

        self.problems
            .get(&(contest_id, index.to_string()))
            .cloned()
            .unwrap_or_else(|| {
                Err(CodeforcesError::Upstream {
                    status: Some(404),
                    message: format!("problem {}{} not found", contest_id, index),
                })
            })
    }
}
