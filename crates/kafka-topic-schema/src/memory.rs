//! In-memory [`TopicClient`] used by tests.
//!
//! Mimics the remote API closely enough to exercise the repository: batch
//! detail calls fail as a whole when a name is unknown, results can be
//! truncated to emulate stale reads, and every operation counts its calls.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_lock::{Mutex, RwLock};
use async_trait::async_trait;
use fluvio_future::timer::sleep;
use tracing::debug;

use crate::topic::{TopicCreateRequest, TopicDetail, TopicSummary, TopicUpdateRequest};
use crate::{ApiError, TopicClient};

const COUNTER_ORDERING: Ordering = Ordering::SeqCst;

#[derive(Debug, Default)]
struct InjectedErrors {
    create: VecDeque<ApiError>,
    update: Option<ApiError>,
    delete: Option<ApiError>,
    list: Option<ApiError>,
    list_details: Option<ApiError>,
}

#[derive(Debug, Default)]
struct CallCounters {
    create: AtomicU32,
    update: AtomicU32,
    delete: AtomicU32,
    list: AtomicU32,
    list_details: AtomicU32,
}

#[derive(Debug, Default)]
pub struct MemoryTopicClient {
    // key format: project/service/topic
    topics: RwLock<BTreeMap<String, TopicDetail>>,
    errors: Mutex<InjectedErrors>,
    calls: CallCounters,
    // number of upcoming list_details responses that miss their last record
    stale_details: AtomicU32,
    latency: Duration,
}

fn storage_key(project: &str, service: &str, topic: &str) -> String {
    format!("{project}/{service}/{topic}")
}

impl MemoryTopicClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// seed a topic as if it already existed remotely
    pub fn with_topic(mut self, project: &str, service: &str, topic: &str) -> Self {
        self.topics
            .get_mut()
            .insert(storage_key(project, service, topic), TopicDetail::new(topic));
        self
    }

    pub fn with_detail(mut self, project: &str, service: &str, detail: TopicDetail) -> Self {
        self.topics.get_mut().insert(
            storage_key(project, service, &detail.topic_name),
            detail,
        );
        self
    }

    /// delay applied to create and list, widens race windows
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// errors returned by consecutive create calls, then creates succeed
    pub fn with_create_errors(mut self, errors: Vec<ApiError>) -> Self {
        self.errors.get_mut().create = errors.into();
        self
    }

    pub fn with_list_error(mut self, error: ApiError) -> Self {
        self.errors.get_mut().list = Some(error);
        self
    }

    pub fn with_list_details_error(mut self, error: ApiError) -> Self {
        self.errors.get_mut().list_details = Some(error);
        self
    }

    pub fn with_delete_error(mut self, error: ApiError) -> Self {
        self.errors.get_mut().delete = Some(error);
        self
    }

    pub fn with_update_error(mut self, error: ApiError) -> Self {
        self.errors.get_mut().update = Some(error);
        self
    }

    /// the next `count` detail responses come back one record short
    pub fn with_stale_details(self, count: u32) -> Self {
        self.stale_details.store(count, COUNTER_ORDERING);
        self
    }

    pub async fn set_list_details_error(&self, error: Option<ApiError>) {
        self.errors.lock().await.list_details = error;
    }

    /// insert a topic behind the repository's back
    pub async fn insert_topic(&self, project: &str, service: &str, topic: &str) {
        self.topics
            .write()
            .await
            .insert(storage_key(project, service, topic), TopicDetail::new(topic));
    }

    /// remove a topic behind the repository's back
    pub async fn remove_topic(&self, project: &str, service: &str, topic: &str) -> bool {
        self.topics
            .write()
            .await
            .remove(&storage_key(project, service, topic))
            .is_some()
    }

    pub async fn contains(&self, project: &str, service: &str, topic: &str) -> bool {
        self.topics
            .read()
            .await
            .contains_key(&storage_key(project, service, topic))
    }

    pub async fn detail(&self, project: &str, service: &str, topic: &str) -> Option<TopicDetail> {
        self.topics
            .read()
            .await
            .get(&storage_key(project, service, topic))
            .cloned()
    }

    pub fn create_calls(&self) -> u32 {
        self.calls.create.load(COUNTER_ORDERING)
    }

    pub fn update_calls(&self) -> u32 {
        self.calls.update.load(COUNTER_ORDERING)
    }

    pub fn delete_calls(&self) -> u32 {
        self.calls.delete.load(COUNTER_ORDERING)
    }

    pub fn list_calls(&self) -> u32 {
        self.calls.list.load(COUNTER_ORDERING)
    }

    pub fn list_details_calls(&self) -> u32 {
        self.calls.list_details.load(COUNTER_ORDERING)
    }

    async fn lag(&self) {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
    }

    fn take_stale_response(&self) -> bool {
        self.stale_details
            .fetch_update(COUNTER_ORDERING, COUNTER_ORDERING, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TopicClient for MemoryTopicClient {
    async fn create(
        &self,
        project: &str,
        service: &str,
        request: &TopicCreateRequest,
    ) -> Result<(), ApiError> {
        self.lag().await;
        self.calls.create.fetch_add(1, COUNTER_ORDERING);
        if let Some(err) = self.errors.lock().await.create.pop_front() {
            return Err(err);
        }

        let key = storage_key(project, service, &request.topic_name);
        let mut topics = self.topics.write().await;
        if topics.contains_key(&key) {
            return Err(ApiError::already_exists(
                "ServiceKafkaTopicCreate",
                "Topic conflict, already exists",
            ));
        }
        debug!(%key, "memory client: topic created");
        topics.insert(key, TopicDetail::from(request));
        Ok(())
    }

    async fn update(
        &self,
        project: &str,
        service: &str,
        topic: &str,
        request: &TopicUpdateRequest,
    ) -> Result<(), ApiError> {
        self.calls.update.fetch_add(1, COUNTER_ORDERING);
        if let Some(err) = self.errors.lock().await.update.clone() {
            return Err(err);
        }

        let mut topics = self.topics.write().await;
        let Some(detail) = topics.get_mut(&storage_key(project, service, topic)) else {
            return Err(ApiError::not_found("ServiceKafkaTopicUpdate", "Topic not found"));
        };
        detail.apply(request);
        Ok(())
    }

    async fn delete(&self, project: &str, service: &str, topic: &str) -> Result<(), ApiError> {
        self.calls.delete.fetch_add(1, COUNTER_ORDERING);
        if let Some(err) = self.errors.lock().await.delete.clone() {
            return Err(err);
        }

        match self
            .topics
            .write()
            .await
            .remove(&storage_key(project, service, topic))
        {
            Some(_) => Ok(()),
            None => Err(ApiError::not_found("ServiceKafkaTopicDelete", "Topic not found")),
        }
    }

    async fn list(&self, project: &str, service: &str) -> Result<Vec<TopicSummary>, ApiError> {
        self.lag().await;
        self.calls.list.fetch_add(1, COUNTER_ORDERING);
        if let Some(err) = self.errors.lock().await.list.clone() {
            return Err(err);
        }

        let prefix = format!("{project}/{service}/");
        let topics = self.topics.read().await;
        Ok(topics
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, detail)| TopicSummary::from(detail))
            .collect())
    }

    async fn list_details(
        &self,
        project: &str,
        service: &str,
        topic_names: &[String],
    ) -> Result<Vec<TopicDetail>, ApiError> {
        self.calls.list_details.fetch_add(1, COUNTER_ORDERING);
        if let Some(err) = self.errors.lock().await.list_details.clone() {
            return Err(err);
        }

        let topics = self.topics.read().await;
        let mut details = Vec::with_capacity(topic_names.len());
        for name in topic_names {
            match topics.get(&storage_key(project, service, name)) {
                Some(detail) => details.push(detail.clone()),
                None => {
                    return Err(ApiError::not_found(
                        "ServiceKafkaTopicListV2",
                        format!("Topic {name} not found"),
                    ));
                }
            }
        }
        drop(topics);

        if self.take_stale_response() {
            details.pop();
        }
        Ok(details)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[fluvio_future::test]
    async fn test_list_details_whole_batch_not_found() {
        let client = MemoryTopicClient::new()
            .with_topic("a", "b", "c")
            .with_topic("a", "b", "d");

        let names = vec!["c".to_owned(), "x".to_owned()];
        let err = client
            .list_details("a", "b", &names)
            .await
            .expect_err("unknown name fails the batch");
        assert!(err.is_not_found());

        let names = vec!["c".to_owned(), "d".to_owned()];
        let details = client.list_details("a", "b", &names).await.expect("details");
        assert_eq!(details.len(), 2);
        assert_eq!(client.list_details_calls(), 2);
    }

    #[fluvio_future::test]
    async fn test_stale_details_are_truncated() {
        let client = MemoryTopicClient::new()
            .with_topic("a", "b", "c")
            .with_topic("a", "b", "d")
            .with_stale_details(1);

        let names = vec!["c".to_owned(), "d".to_owned()];
        assert_eq!(client.list_details("a", "b", &names).await.expect("first").len(), 1);
        assert_eq!(client.list_details("a", "b", &names).await.expect("second").len(), 2);
    }

    #[fluvio_future::test]
    async fn test_list_is_scoped_to_service() {
        let client = MemoryTopicClient::new()
            .with_topic("a", "b", "c")
            .with_topic("a", "bb", "d");

        let list = client.list("a", "b").await.expect("list");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].topic_name, "c");
    }

    #[fluvio_future::test]
    async fn test_create_conflict() {
        let client = MemoryTopicClient::new().with_topic("a", "b", "c");
        let err = client
            .create("a", "b", &TopicCreateRequest::new("c"))
            .await
            .expect_err("conflict");
        assert!(err.is_already_exists());

        client
            .create("a", "b", &TopicCreateRequest::new("d"))
            .await
            .expect("created");
        assert!(client.contains("a", "b", "d").await);
        assert_eq!(client.create_calls(), 2);
    }
}
