//! Batching, read-through cache for managed Kafka topic metadata.
//!
//! [`TopicRepository`] sits in front of a [`TopicClient`](kafka_topic_schema::TopicClient)
//! and keeps the number of remote calls low when many topics of the same
//! service are managed at once:
//!
//! * existence checks list each service once and answer from memory afterwards
//! * detail reads are queued and resolved by a background worker with one
//!   batch call per service and chunk of names
//! * batch answers missing records are retried, the remote caches them for a few seconds

mod cache;
mod config;
mod error;
mod fetcher;
mod key;
mod repository;
mod request;
mod worker;

pub mod retry;

pub use config::{LoadConfigError, RepositoryConfig, RepositoryConfigBuilder, RepositoryConfigBuilderError};
pub use error::{BatchError, Result, TopicRepositoryError};
pub use key::{ServiceKey, TopicKey};
pub use repository::TopicRepository;

pub use kafka_topic_schema as schema;
