//! Outbound clients.

pub mod aggregator;

pub use aggregator::{AggregatorClient, HttpAggregatorClient};
