pub mod api;
pub mod cache;
pub mod codeforces;

pub use cache::TtlCache;
pub use codeforces::client::{
    ClientConfig, CodeforcesApi, CodeforcesClient, CodeforcesError, Result,
};
pub use codeforces::retry::RetryPolicy;
