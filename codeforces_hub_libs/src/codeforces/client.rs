use crate::codeforces::{
    model::{ApiResponse, ApiStatus, Contest, RawProblem, Standings, StandingsProblem},
    retry::RetryPolicy,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Client, StatusCode, Url,
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::{
    sync::Mutex,
    time::{self, Duration, Instant},
};

pub type Result<T> = std::result::Result<T, CodeforcesError>;

static PROBLEM_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][0-9]?$").unwrap());

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodeforcesError {
    #[error("upstream error{}: {message}", status_label(.status))]
    Upstream {
        status: Option<u16>,
        message: String,
    },
    #[error("upstream timeout")]
    Timeout,
    #[error("malformed upstream response: {0}")]
    MalformedUpstream(String),
    #[error("invalid parameter: {0}")]
    Validation(String),
}

fn status_label(status: &Option<u16>) -> String {
    status
        .map(|status| format!(" (status {})", status))
        .unwrap_or_default()
}

impl CodeforcesError {
    pub fn kind(&self) -> &'static str {
        match self {
            CodeforcesError::Upstream { .. } => "UpstreamError",
            CodeforcesError::Timeout => "TimeoutError",
            CodeforcesError::MalformedUpstream(_) => "MalformedUpstreamError",
            CodeforcesError::Validation(_) => "ValidationError",
        }
    }

    /// Only timeouts and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            CodeforcesError::Timeout => true,
            CodeforcesError::Upstream {
                status: Some(status),
                ..
            } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CodeforcesError::Upstream {
                status: Some(404),
                ..
            }
        )
    }
}

impl From<reqwest::Error> for CodeforcesError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CodeforcesError::Timeout
        } else {
            CodeforcesError::Upstream {
                status: e.status().map(|status| status.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid upstream url")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build http client")]
    Http(#[from] reqwest::Error),
}

pub fn validate_contest_id(contest_id: i64) -> Result<u64> {
    if contest_id > 0 {
        Ok(contest_id as u64)
    } else {
        Err(CodeforcesError::Validation(format!(
            "contest id must be a positive integer, got {}",
            contest_id
        )))
    }
}

pub fn validate_problem_index(index: &str) -> Result<()> {
    if PROBLEM_INDEX.is_match(index) {
        Ok(())
    } else {
        Err(CodeforcesError::Validation(format!(
            "problem index must match ^[A-Z][0-9]?$, got {:?}",
            index
        )))
    }
}

/// Unwraps the API envelope, turning `FAILED` responses and non-2xx statuses into errors.
pub fn decode_api_response<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T> {
    match serde_json::from_slice::<ApiResponse<T>>(body) {
        Ok(ApiResponse {
            status: ApiStatus::Ok,
            result: Some(result),
            ..
        }) if status.is_success() => Ok(result),
        Ok(response) => {
            let message = response
                .comment
                .unwrap_or_else(|| format!("unexpected response with HTTP status {}", status));
            let status = if message.to_lowercase().contains("not found") {
                StatusCode::NOT_FOUND
            } else {
                status
            };
            Err(CodeforcesError::Upstream {
                status: Some(status.as_u16()),
                message,
            })
        }
        Err(e) if status.is_success() => Err(CodeforcesError::Upstream {
            status: Some(status.as_u16()),
            message: format!("malformed JSON: {}", e),
        }),
        Err(_) => Err(CodeforcesError::Upstream {
            status: Some(status.as_u16()),
            message: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        }),
    }
}

#[async_trait]
pub trait CodeforcesApi: Send + Sync {
    async fn fetch_contest_list(&self) -> Result<Vec<Contest>>;
    async fn fetch_standings_header(&self, contest_id: u64) -> Result<Vec<StandingsProblem>>;
    async fn fetch_problem_detail(&self, contest_id: u64, index: &str) -> Result<RawProblem>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub min_interval: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            min_interval: Duration::ZERO,
            user_agent: format!("codeforces_hub/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Spaces out upstream calls by at least `interval`.
struct RateGate {
    interval: Duration,
    next: Mutex<Instant>,
}

impl RateGate {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Mutex::new(Instant::now()),
        }
    }

    async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        let mut next = self.next.lock().await;
        let now = Instant::now();
        if *next > now {
            time::sleep_until(*next).await;
        }
        *next = Instant::now() + self.interval;
    }
}

pub struct CodeforcesClient {
    contest_list_url: Url,
    standings_url: Url,
    web_url: Url,
    client: Client,
    retry: RetryPolicy,
    gate: RateGate,
}

impl CodeforcesClient {
    pub fn new(base_url: &str, config: ClientConfig) -> std::result::Result<Self, ClientBuildError> {
        let mut web_url = Url::parse(base_url)?;
        if !web_url.path().ends_with('/') {
            let path = format!("{}/", web_url.path());
            web_url.set_path(&path);
        }
        let contest_list_url = web_url.join("api/contest.list")?;
        let standings_url = web_url.join("api/contest.standings")?;

        let mut headers = HeaderMap::new();
        match HeaderValue::from_str(&config.user_agent) {
            Ok(value) => {
                headers.insert(USER_AGENT, value);
            }
            Err(_) => tracing::warn!("ignoring invalid user agent {:?}", config.user_agent),
        }
        let client = Client::builder()
            .gzip(true)
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(CodeforcesClient {
            contest_list_url,
            standings_url,
            web_url,
            client,
            retry: config.retry,
            gate: RateGate::new(config.min_interval),
        })
    }

    pub fn problem_url(&self, contest_id: u64, index: &str) -> Result<Url> {
        self.web_url
            .join(&format!("contest/{}/problem/{}", contest_id, index))
            .map_err(|e| CodeforcesError::Validation(e.to_string()))
    }

    async fn get_api<T: DeserializeOwned>(&self, url: &Url, query: &[(&str, String)]) -> Result<T> {
        self.gate.wait().await;
        let res = self.client.get(url.clone()).query(query).send().await?;
        let status = res.status();
        let body = res.bytes().await?;

        decode_api_response(status, &body)
    }

    async fn get_page(&self, url: &Url) -> Result<String> {
        self.gate.wait().await;
        let res = self.client.get(url.clone()).send().await?;
        let status = res.status();

        if status == StatusCode::NOT_FOUND {
            return Err(CodeforcesError::Upstream {
                status: Some(status.as_u16()),
                message: format!("{} not found", url),
            });
        }
        if !status.is_success() {
            return Err(CodeforcesError::Upstream {
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }
        // Unknown problems are redirected to the contest page instead of answering 404.
        if res.url().path().trim_end_matches('/') != url.path().trim_end_matches('/') {
            return Err(CodeforcesError::Upstream {
                status: Some(StatusCode::NOT_FOUND.as_u16()),
                message: format!("{} redirected to {}", url, res.url()),
            });
        }

        Ok(res.text().await?)
    }
}

#[async_trait]
impl CodeforcesApi for CodeforcesClient {
    async fn fetch_contest_list(&self) -> Result<Vec<Contest>> {
        tracing::info!("Start to retrieve contest list from Codeforces");
        let url = &self.contest_list_url;
        let query: &[(&str, String)] = &[("gym", String::from("false"))];
        let contests: Vec<Contest> = self
            .retry
            .run("contest.list", move || self.get_api(url, query))
            .await?;

        tracing::info!("{} contests successfully retrieved.", contests.len());
        Ok(contests)
    }

    async fn fetch_standings_header(&self, contest_id: u64) -> Result<Vec<StandingsProblem>> {
        validate_contest_id(contest_id as i64)?;

        let url = &self.standings_url;
        let query: &[(&str, String)] = &[
            ("contestId", contest_id.to_string()),
            ("from", String::from("1")),
            ("count", String::from("1")),
        ];
        let standings: Standings = self
            .retry
            .run("contest.standings", move || self.get_api(url, query))
            .await?;

        tracing::debug!(
            "contest {} has {} problems",
            contest_id,
            standings.problems.len()
        );
        Ok(standings.problems)
    }

    async fn fetch_problem_detail(&self, contest_id: u64, index: &str) -> Result<RawProblem> {
        validate_contest_id(contest_id as i64)?;
        validate_problem_index(index)?;

        let url = self.problem_url(contest_id, index)?;
        tracing::info!("Crawl {}", url);
        let url = &url;
        let html = self
            .retry
            .run("problem page", move || self.get_page(url))
            .await?;

        Ok(RawProblem::detect(html))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::{extract::Query, response::Redirect, routing, Router};
    use std::{
        collections::HashMap,
        net::TcpListener,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    #[test]
    fn create_new_client() {
        let client =
            CodeforcesClient::new("https://codeforces.com", ClientConfig::default()).unwrap();

        assert_eq!(
            client.contest_list_url,
            Url::parse("https://codeforces.com/api/contest.list").unwrap()
        );
        assert_eq!(
            client.standings_url,
            Url::parse("https://codeforces.com/api/contest.standings").unwrap()
        );
        assert_eq!(
            client.problem_url(1950, "B1").unwrap(),
            Url::parse("https://codeforces.com/contest/1950/problem/B1").unwrap()
        );
    }

    #[test]
    fn base_url_path_prefix_is_kept() {
        let client =
            CodeforcesClient::new("http://localhost:8080/mirror", ClientConfig::default())
                .unwrap();

        assert_eq!(
            client.contest_list_url,
            Url::parse("http://localhost:8080/mirror/api/contest.list").unwrap()
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(CodeforcesClient::new("not a url", ClientConfig::default()).is_err());
    }

    #[test]
    fn validate_parameters() {
        assert_eq!(validate_contest_id(1).unwrap(), 1);
        assert!(matches!(
            validate_contest_id(0),
            Err(CodeforcesError::Validation(_))
        ));
        assert!(validate_contest_id(-5).is_err());

        assert!(validate_problem_index("A").is_ok());
        assert!(validate_problem_index("B1").is_ok());
        assert!(validate_problem_index("a").is_err());
        assert!(validate_problem_index("A12").is_err());
        assert!(validate_problem_index("Z99").is_err());
        assert!(validate_problem_index("").is_err());
    }

    #[test]
    fn decode_successful_response() {
        let body = br#"{"status":"OK","result":{"contest":{},"problems":[{"index":"A","name":"X"},{"index":"B"}],"rows":[]}}"#;
        let standings: Standings = decode_api_response(StatusCode::OK, body).unwrap();

        let indexes: Vec<&str> = standings.problems.iter().map(|p| p.index.as_str()).collect();
        assert_eq!(indexes, vec!["A", "B"]);
    }

    #[test]
    fn decode_not_found_comment_as_404() {
        let body = br#"{"status":"FAILED","comment":"contestId: Contest with id 999999 not found"}"#;
        let error = decode_api_response::<Standings>(StatusCode::BAD_REQUEST, body).unwrap_err();

        assert!(error.is_not_found());
        assert!(!error.is_retryable());
        assert_eq!(error.kind(), "UpstreamError");
    }

    #[test]
    fn decode_server_error_page() {
        let error = decode_api_response::<Standings>(
            StatusCode::SERVICE_UNAVAILABLE,
            b"<html>maintenance</html>",
        )
        .unwrap_err();

        assert_eq!(
            error,
            CodeforcesError::Upstream {
                status: Some(503),
                message: String::from("Service Unavailable"),
            }
        );
        assert!(error.is_retryable());
    }

    #[test]
    fn decode_malformed_json() {
        let error =
            decode_api_response::<Standings>(StatusCode::OK, b"{\"status\":\"OK\",").unwrap_err();

        assert!(matches!(
            error,
            CodeforcesError::Upstream { status: Some(200), ref message } if message.starts_with("malformed JSON")
        ));
    }

    #[test]
    fn error_messages() {
        assert_eq!(CodeforcesError::Timeout.to_string(), "upstream timeout");
        assert_eq!(
            CodeforcesError::Upstream {
                status: Some(500),
                message: String::from("boom"),
            }
            .to_string(),
            "upstream error (status 500): boom"
        );
        assert_eq!(
            CodeforcesError::Upstream {
                status: None,
                message: String::from("connection refused"),
            }
            .to_string(),
            "upstream error: connection refused"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rate_gate_spaces_out_calls() {
        let gate = RateGate::new(Duration::from_millis(500));
        let start = Instant::now();

        gate.wait().await;
        gate.wait().await;
        gate.wait().await;

        assert!(Instant::now() - start >= Duration::from_millis(1000));
    }

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service());
        tokio::spawn(async move { server.await.unwrap() });

        format!("http://{}", addr)
    }

    fn local_config(max_retries: u32) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_millis(300),
            retry: RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(1),
                factor: 2.0,
                jitter: 0.0,
            },
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn contest_list_is_retried_on_server_errors() {
        let counter = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&counter);
        let app = Router::new().route(
            "/api/contest.list",
            routing::get(move || {
                let hits = Arc::clone(&hits);
                async move {
                    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::SERVICE_UNAVAILABLE, String::from("busy"))
                    } else {
                        (
                            StatusCode::OK,
                            String::from(
                                r#"{"status":"OK","result":[{"id":4,"name":"Codeforces Beta Round 4 (Div. 2)","phase":"FINISHED","startTimeSeconds":1268395200}]}"#,
                            ),
                        )
                    }
                }
            }),
        );
        let client = CodeforcesClient::new(&serve(app).await, local_config(2)).unwrap();

        let contests = client.fetch_contest_list().await.unwrap();

        assert_eq!(contests.len(), 1);
        assert!(contests[0].is_finished());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn standings_request_carries_query_and_user_agent() {
        let app = Router::new().route(
            "/api/contest.standings",
            routing::get(
                |Query(query): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                    let user_agent = headers
                        .get(USER_AGENT)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default();
                    let expected = [("contestId", "4"), ("from", "1"), ("count", "1")]
                        .iter()
                        .all(|(key, value)| query.get(*key).map(String::as_str) == Some(*value));

                    if expected && user_agent.starts_with("codeforces_hub/") {
                        (
                            StatusCode::OK,
                            r#"{"status":"OK","result":{"contest":{"id":4},"problems":[{"index":"A"},{"index":"B"}],"rows":[]}}"#,
                        )
                    } else {
                        (
                            StatusCode::BAD_REQUEST,
                            r#"{"status":"FAILED","comment":"unexpected request"}"#,
                        )
                    }
                },
            ),
        );
        let client = CodeforcesClient::new(&serve(app).await, local_config(0)).unwrap();

        let problems = client.fetch_standings_header(4).await.unwrap();

        let indexes: Vec<&str> = problems.iter().map(|p| p.index.as_str()).collect();
        assert_eq!(indexes, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn slow_upstream_is_a_timeout() {
        let app = Router::new().route(
            "/api/contest.list",
            routing::get(|| async {
                time::sleep(Duration::from_secs(5)).await;
                r#"{"status":"OK","result":[]}"#
            }),
        );
        let client = CodeforcesClient::new(&serve(app).await, local_config(0)).unwrap();

        let result = client.fetch_contest_list().await;

        assert_eq!(result.unwrap_err(), CodeforcesError::Timeout);
    }

    #[tokio::test]
    async fn problem_page_outcomes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&counter);
        let app = Router::new()
            .route(
                "/contest/4/problem/A",
                routing::get(|| async { r#"<div class="problem-statement"></div>"# }),
            )
            .route(
                "/contest/4/problem/B",
                routing::get(|| async { Redirect::to("/contest/4") }),
            )
            .route("/contest/4", routing::get(|| async { "contest page" }))
            .route(
                "/contest/5/problem/A",
                routing::get(|| async { (StatusCode::NOT_FOUND, "no such problem") }),
            )
            .route(
                "/contest/6/problem/A",
                routing::get(move || {
                    let hits = Arc::clone(&hits);
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        (StatusCode::BAD_GATEWAY, "bad gateway")
                    }
                }),
            );
        let client = CodeforcesClient::new(&serve(app).await, local_config(2)).unwrap();

        let page = client.fetch_problem_detail(4, "A").await.unwrap();
        assert_eq!(
            page,
            RawProblem::Html(String::from(r#"<div class="problem-statement"></div>"#))
        );

        // Unknown problems are answered with a redirect to the contest page.
        let redirected = client.fetch_problem_detail(4, "B").await.unwrap_err();
        assert!(redirected.is_not_found(), "{:?}", redirected);

        let missing = client.fetch_problem_detail(5, "A").await.unwrap_err();
        assert!(missing.is_not_found(), "{:?}", missing);

        let failing = client.fetch_problem_detail(6, "A").await.unwrap_err();
        assert!(matches!(
            failing,
            CodeforcesError::Upstream {
                status: Some(502),
                ..
            }
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    /// Live test against codeforces.com.
    #[tokio::test]
    #[ignore]
    async fn test_fetch_contest_list() {
        let client =
            CodeforcesClient::new("https://codeforces.com", ClientConfig::default()).unwrap();
        let contests = client.fetch_contest_list().await.unwrap();

        assert!(contests.iter().any(|contest| contest.is_finished()));
    }

    /// Live test against codeforces.com.
    #[tokio::test]
    #[ignore]
    async fn test_fetch_standings_header() {
        let client =
            CodeforcesClient::new("https://codeforces.com", ClientConfig::default()).unwrap();
        let problems = client.fetch_standings_header(4).await.unwrap();

        assert_eq!(problems.first().map(|p| p.index.as_str()), Some("A"));
    }
}
