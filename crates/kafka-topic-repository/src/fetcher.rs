//! Batched reads of topic details.
//!
//! The remote batch call rejects the whole batch with `NotFound` when any
//! name is unknown, so only names confirmed by the existence probe may be
//! queued here.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, instrument, warn};

use kafka_topic_schema::SharedTopicClient;
use kafka_topic_schema::topic::TopicDetail;

use crate::config::RepositoryConfig;
use crate::error::{BatchError, TopicRepositoryError};
use crate::key::ServiceKey;
use crate::request::{PendingRequest, RequestQueue};
use crate::retry::{RetryError, RetryOutcome, RetryPolicy, retry_with_delay};

/// requests of a single service, waiters grouped by topic name
#[derive(Debug)]
struct ServiceRequests {
    project: String,
    service: String,
    waiters: BTreeMap<String, Vec<PendingRequest>>,
}

fn group_by_service(queue: RequestQueue) -> HashMap<ServiceKey, ServiceRequests> {
    let mut by_service: HashMap<ServiceKey, ServiceRequests> = HashMap::new();
    for (_, requests) in queue {
        let Some(first) = requests.first() else {
            continue;
        };
        let topic = first.topic.clone();
        let group = by_service
            .entry(first.service_key())
            .or_insert_with(|| ServiceRequests {
                project: first.project.clone(),
                service: first.service.clone(),
                waiters: BTreeMap::new(),
            });
        group.waiters.entry(topic).or_default().extend(requests);
    }
    by_service
}

fn resolve(waiters: Vec<PendingRequest>, result: Result<&TopicDetail, &TopicRepositoryError>) {
    for request in waiters {
        request.send(result.cloned().map_err(Clone::clone));
    }
}

pub(crate) struct BatchFetcher {
    client: SharedTopicClient,
    batch_size: usize,
    policy: RetryPolicy,
}

impl BatchFetcher {
    pub fn new(client: SharedTopicClient, config: &RepositoryConfig) -> Self {
        Self {
            client,
            batch_size: config.batch_size.max(1),
            policy: config.retry_policy(),
        }
    }

    /// Fetches every queued topic and resolves all of its waiters.
    #[instrument(skip_all, fields(topics = queue.len()))]
    pub async fn fetch(&self, queue: RequestQueue) {
        for (service_key, mut group) in group_by_service(queue) {
            let names: Vec<String> = group.waiters.keys().cloned().collect();

            for chunk in names.chunks(self.batch_size) {
                let result = self
                    .fetch_chunk(&group.project, &group.service, chunk)
                    .await;

                match result {
                    Ok(details) => {
                        let mut by_name: HashMap<String, TopicDetail> = details
                            .into_iter()
                            .map(|detail| (detail.topic_name.clone(), detail))
                            .collect();

                        for name in chunk {
                            let waiters = group.waiters.remove(name).unwrap_or_default();
                            match by_name.remove(name) {
                                Some(detail) => resolve(waiters, Ok(&detail)),
                                None => {
                                    let err = TopicRepositoryError::TopicRead(RetryError::new(
                                        vec![BatchError::MissingTopic(name.clone())],
                                    ));
                                    resolve(waiters, Err(&err));
                                }
                            }
                        }
                    }
                    Err(err) => {
                        warn!(service = %service_key, chunk = chunk.len(), %err, "topic batch failed");
                        let err = TopicRepositoryError::TopicRead(err);
                        for name in chunk {
                            let waiters = group.waiters.remove(name).unwrap_or_default();
                            resolve(waiters, Err(&err));
                        }
                    }
                }
            }
        }
    }

    async fn fetch_chunk(
        &self,
        project: &str,
        service: &str,
        names: &[String],
    ) -> Result<Vec<TopicDetail>, RetryError<BatchError>> {
        retry_with_delay(&self.policy, |attempt| async move {
            debug!(attempt, project, service, count = names.len(), "reading topic batch");
            match self.client.list_details(project, service, names).await {
                // every name was confirmed before queueing, so the listing is outdated
                Err(err) if err.is_not_found() => {
                    RetryOutcome::Fatal(BatchError::TopicListChanged(err))
                }
                // the client already retries transient failures
                Err(err) => RetryOutcome::Fatal(BatchError::Remote(err)),
                Ok(details) if details.len() != names.len() => {
                    RetryOutcome::Retry(BatchError::Incomplete {
                        received: details.len(),
                        expected: names.len(),
                    })
                }
                Ok(details) => RetryOutcome::Done(details),
            }
        })
        .await
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use async_channel::Receiver;

    use kafka_topic_schema::ApiError;
    use kafka_topic_schema::memory::MemoryTopicClient;

    use crate::request::{ReadResult, into_queue};

    use super::*;

    fn config(batch_size: usize) -> RepositoryConfig {
        RepositoryConfig::builder()
            .batch_size(batch_size)
            .batch_retry_delay(Duration::from_millis(5))
            .batch_retry_attempts(3)
            .build()
            .expect("config")
    }

    fn requests(
        topics: &[(&str, &str, &str)],
    ) -> (RequestQueue, Vec<Receiver<ReadResult>>) {
        let mut pending = vec![];
        let mut receivers = vec![];
        for (project, service, topic) in topics {
            let (request, receiver) = PendingRequest::new(project, service, topic);
            pending.push(request);
            receivers.push(receiver);
        }
        (into_queue(pending), receivers)
    }

    async fn results(receivers: Vec<Receiver<ReadResult>>) -> Vec<ReadResult> {
        let mut out = vec![];
        for receiver in receivers {
            out.push(receiver.recv().await.expect("every request is resolved"));
        }
        out
    }

    #[fluvio_future::test]
    async fn test_groups_by_service_and_chunks() {
        let client = Arc::new(
            MemoryTopicClient::new()
                .with_topic("a", "a", "a")
                .with_topic("a", "a", "b")
                .with_topic("a", "a", "c")
                .with_topic("a", "b", "a")
                .with_topic("a", "b", "b")
                .with_topic("a", "b", "c"),
        );
        let fetcher = BatchFetcher::new(client.clone(), &config(2));

        let (queue, receivers) = requests(&[
            ("a", "a", "a"),
            ("a", "a", "b"),
            ("a", "a", "c"),
            ("a", "b", "a"),
            ("a", "b", "b"),
            ("a", "b", "c"),
        ]);
        fetcher.fetch(queue).await;

        let expected = ["a", "b", "c", "a", "b", "c"];
        for (result, name) in results(receivers).await.into_iter().zip(expected) {
            assert_eq!(result.expect("detail").topic_name, name);
        }
        // ceil(3/2) + ceil(3/2)
        assert_eq!(client.list_details_calls(), 4);
    }

    #[fluvio_future::test]
    async fn test_incomplete_batch_is_retried() {
        let client = Arc::new(
            MemoryTopicClient::new()
                .with_topic("a", "b", "c")
                .with_topic("a", "b", "d")
                .with_stale_details(1),
        );
        let fetcher = BatchFetcher::new(client.clone(), &config(100));

        let (queue, receivers) = requests(&[("a", "b", "c"), ("a", "b", "d")]);
        fetcher.fetch(queue).await;

        for result in results(receivers).await {
            assert!(result.is_ok());
        }
        assert_eq!(client.list_details_calls(), 2);
    }

    #[fluvio_future::test]
    async fn test_incomplete_batch_gives_up() {
        let client = Arc::new(
            MemoryTopicClient::new()
                .with_topic("a", "b", "c")
                .with_stale_details(10),
        );
        let fetcher = BatchFetcher::new(client.clone(), &config(100));

        let (queue, receivers) = requests(&[("a", "b", "c")]);
        fetcher.fetch(queue).await;

        let err = results(receivers)
            .await
            .remove(0)
            .expect_err("stale for every attempt");
        assert_eq!(
            err.to_string(),
            "topic read error: All attempts fail:\n\
             #1: got 0 topics, expected 1. Retrying\n\
             #2: got 0 topics, expected 1. Retrying\n\
             #3: got 0 topics, expected 1. Retrying"
        );
        assert_eq!(client.list_details_calls(), 3);
    }

    #[fluvio_future::test]
    async fn test_not_found_is_unrecoverable() {
        let client = Arc::new(
            MemoryTopicClient::new()
                .with_topic("a", "b", "c")
                .with_list_details_error(ApiError::not_found("ServiceKafkaTopicListV2", "Foo")),
        );
        let fetcher = BatchFetcher::new(client.clone(), &config(100));

        let (queue, receivers) = requests(&[("a", "b", "c")]);
        fetcher.fetch(queue).await;

        let err = results(receivers).await.remove(0).expect_err("404");
        assert_eq!(
            err.to_string(),
            "topic read error: All attempts fail:\n#1: topic list has changed: [404 ServiceKafkaTopicListV2]: Foo"
        );
        assert!(err.is_not_found());
        assert_eq!(client.list_details_calls(), 1);
    }

    #[fluvio_future::test]
    async fn test_remote_error_is_unrecoverable() {
        let client = Arc::new(
            MemoryTopicClient::new()
                .with_topic("a", "b", "c")
                .with_list_details_error(ApiError::remote("ServiceKafkaTopicListV2", 500, "bla bla bla")),
        );
        let fetcher = BatchFetcher::new(client.clone(), &config(100));

        let (queue, receivers) = requests(&[("a", "b", "c")]);
        fetcher.fetch(queue).await;

        let err = results(receivers).await.remove(0).expect_err("500");
        assert_eq!(
            err.to_string(),
            "topic read error: All attempts fail:\n#1: [500 ServiceKafkaTopicListV2]: bla bla bla"
        );
        assert_eq!(client.list_details_calls(), 1);
    }

    #[fluvio_future::test]
    async fn test_failed_chunk_does_not_affect_others() {
        // "c" vanished after it was probed
        let client = Arc::new(
            MemoryTopicClient::new()
                .with_topic("a", "b", "a")
                .with_topic("a", "b", "b"),
        );
        let fetcher = BatchFetcher::new(client.clone(), &config(2));

        let (queue, receivers) = requests(&[("a", "b", "a"), ("a", "b", "b"), ("a", "b", "c")]);
        fetcher.fetch(queue).await;

        let results = results(receivers).await;
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].as_ref().expect_err("vanished").is_not_found());
        assert_eq!(client.list_details_calls(), 2);
    }

    #[fluvio_future::test]
    async fn test_duplicate_readers_share_result() {
        let client = Arc::new(MemoryTopicClient::new().with_topic("a", "b", "c"));
        let fetcher = BatchFetcher::new(client.clone(), &config(100));

        let (queue, receivers) = requests(&[("a", "b", "c"), ("a", "b", "c")]);
        assert_eq!(queue.len(), 1);
        fetcher.fetch(queue).await;

        for result in results(receivers).await {
            assert_eq!(result.expect("detail").topic_name, "c");
        }
        assert_eq!(client.list_details_calls(), 1);
    }
}
