//! Remote boundary of the topic repository.
//!
//! This crate holds the topic model exchanged with the managed Kafka API,
//! the error kinds the API distinguishes, and the [`TopicClient`] trait the
//! repository consumes. Transport, authentication and transport-level retries
//! live in the concrete client implementation, not here.

mod client;
mod error;
pub mod topic;

#[cfg(feature = "fixture")]
pub mod memory;

pub use client::{TopicClient, SharedTopicClient};
pub use error::ApiError;

//
// Types
//
pub type ProjectName = String;
pub type ServiceName = String;
pub type TopicName = String;
pub type PartitionCount = i32;
pub type ReplicationFactor = i32;
