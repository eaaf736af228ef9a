use crate::codeforces::client::CodeforcesError;
use serde::{Deserialize, Serialize};

/// Body returned by every failed request.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

impl ErrorResponse {
    pub fn new(error: impl ToString, kind: impl ToString) -> Self {
        Self {
            error: error.to_string(),
            kind: kind.to_string(),
        }
    }
}

impl From<&CodeforcesError> for ErrorResponse {
    fn from(e: &CodeforcesError) -> ErrorResponse {
        ErrorResponse::new(e, e.kind())
    }
}
