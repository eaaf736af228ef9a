use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope wrapping every response of the Codeforces API.
///
/// Successful calls carry `status: "OK"` and a `result`; failed calls carry
/// `status: "FAILED"` and a human readable `comment`.
#[derive(Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub status: ApiStatus,
    pub comment: Option<String>,
    pub result: Option<T>,
}

#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiStatus {
    Ok,
    Failed,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContestPhase {
    Before,
    Coding,
    PendingSystemTest,
    SystemTest,
    Finished,
    #[serde(other)]
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contest {
    pub id: u64,
    pub name: String,
    pub phase: ContestPhase,
    pub start_time_seconds: Option<i64>,
}

impl Contest {
    pub fn is_finished(&self) -> bool {
        self.phase == ContestPhase::Finished
    }
}

/// One entry of the `problems` array returned by `contest.standings`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StandingsProblem {
    pub index: String,
    pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Standings {
    pub problems: Vec<StandingsProblem>,
}

/// Problem payload as served by the upstream, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawProblem {
    /// Full HTML of a problem details page.
    Html(String),
    /// Statement object of a JSON-speaking upstream.
    Json(Value),
}

impl RawProblem {
    /// A JSON object is a statement object; anything else is taken as an HTML page.
    pub fn detect(text: String) -> Self {
        match serde_json::from_str::<Value>(&text) {
            Ok(value @ Value::Object(_)) => RawProblem::Json(value),
            _ => RawProblem::Html(text),
        }
    }
}
