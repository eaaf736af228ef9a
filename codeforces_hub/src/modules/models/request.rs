use crate::modules::models::response::ApiError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use http::request::Parts;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Serialize, Deserialize, Validate, PartialEq, Eq, Default)]
pub struct ContestListParameters {
    pub category: Option<String>,
    #[validate(range(min = 1))]
    pub limit: Option<i64>,
}

impl ContestListParameters {
    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or_default()
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

/// Query string deserialized with `serde_urlencoded` and checked with `validator`.
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();
        let value: T = serde_urlencoded::from_str(query).map_err(|rejection| {
            tracing::error!("Parsing error: {}", rejection);
            ApiError::validation(format!("invalid format query string: [{}]", rejection))
        })?;

        value.validate().map_err(|rejection| {
            tracing::error!("Validation error: {}", rejection);
            ApiError::validation(format!("[{}]", rejection).replace('\n', ", "))
        })?;

        Ok(ValidatedQuery(value))
    }
}
