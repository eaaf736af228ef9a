pub mod aggregator;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod service;

#[cfg(test)]
pub mod mock;
