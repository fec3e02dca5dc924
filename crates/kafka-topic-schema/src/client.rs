use std::sync::Arc;

use async_trait::async_trait;

use crate::ApiError;
use crate::topic::{TopicCreateRequest, TopicDetail, TopicSummary, TopicUpdateRequest};

pub type SharedTopicClient = Arc<dyn TopicClient>;

/// Operations on Kafka topics exposed by the remote management API.
///
/// Implementations are expected to retry transient transport failures
/// themselves. Every operation reports a missing project, service or topic
/// as [`ApiError::NotFound`] and a create conflict as
/// [`ApiError::AlreadyExists`].
#[async_trait]
pub trait TopicClient: Send + Sync {
    async fn create(
        &self,
        project: &str,
        service: &str,
        request: &TopicCreateRequest,
    ) -> Result<(), ApiError>;

    async fn update(
        &self,
        project: &str,
        service: &str,
        topic: &str,
        request: &TopicUpdateRequest,
    ) -> Result<(), ApiError>;

    async fn delete(&self, project: &str, service: &str, topic: &str) -> Result<(), ApiError>;

    /// Lists every topic of the service. Freshly created topics may be missing.
    async fn list(&self, project: &str, service: &str) -> Result<Vec<TopicSummary>, ApiError>;

    /// Reads full topic details in one call.
    ///
    /// Fails with `NotFound` for the whole batch if any name does not exist,
    /// and may return fewer records than requested while the remote catches up.
    async fn list_details(
        &self,
        project: &str,
        service: &str,
        topic_names: &[String],
    ) -> Result<Vec<TopicDetail>, ApiError>;
}
