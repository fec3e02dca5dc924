use std::future::{Future, pending};
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_channel::Receiver;
use async_lock::Mutex;
use fluvio_future::timer::sleep;
use tracing::{debug, instrument, trace};

use kafka_topic_schema::SharedTopicClient;
use kafka_topic_schema::topic::{TopicCreateRequest, TopicDetail, TopicUpdateRequest};

use crate::cache::ExistenceCache;
use crate::config::RepositoryConfig;
use crate::error::{Result, TopicRepositoryError};
use fluvio_types::event::StickyEvent;
use crate::key::{ServiceKey, TopicKey};
use crate::request::{PendingRequest, ReadResult, RequestQueue, into_queue};
use crate::worker::BatchWorker;

/// Everything guarded by the repository lock
#[derive(Debug, Default)]
pub(crate) struct RepositoryState {
    cache: ExistenceCache,
    queue: Vec<PendingRequest>,
    // set by the worker when it exits, no request is accepted afterwards
    closed: bool,
}

pub(crate) struct RepositoryInner {
    pub client: SharedTopicClient,
    pub config: RepositoryConfig,
    pub stop: Arc<StickyEvent>,
    state: Mutex<RepositoryState>,
    started: AtomicBool,
}

impl RepositoryInner {
    /// Takes the whole queue, leaving an empty one behind.
    pub async fn withdraw(&self) -> Option<RequestQueue> {
        let mut state = self.state.lock().await;
        if state.queue.is_empty() {
            return None;
        }
        let drained = mem::take(&mut state.queue);
        drop(state);

        Some(into_queue(drained))
    }

    /// Refuses further requests and returns the ones still queued.
    pub async fn close(&self) -> Vec<PendingRequest> {
        let mut state = self.state.lock().await;
        state.closed = true;
        mem::take(&mut state.queue)
    }
}

/// Read-through, batching cache in front of the remote topic API.
///
/// Existence checks are answered from a local cache filled by one listing
/// per service. Detail reads are queued, coalesced by a background worker
/// into batch calls, and fanned back out to the waiting callers.
///
/// The handle is cheap to clone. Build one per process and share it with
/// every collaborator: the cache and the queue are only consistent when
/// all calls go through the same instance.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use kafka_topic_repository::{TopicRepository, RepositoryConfig, TopicRepositoryError};
/// # use kafka_topic_repository::schema::SharedTopicClient;
/// # async fn do_read(client: SharedTopicClient) -> Result<(), TopicRepositoryError> {
/// let repository = TopicRepository::shared(client, RepositoryConfig::default());
/// if repository.exists("my-project", "kafka-1", "orders").await? {
///     let detail = repository.read("my-project", "kafka-1", "orders").await?;
///     println!("{} partitions", detail.partitions);
/// }
/// repository.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TopicRepository {
    inner: Arc<RepositoryInner>,
}

impl TopicRepository {
    /// Creates a repository without starting its worker.
    ///
    /// Reads issued before [`start`](Self::start) stay queued until the first tick.
    pub fn new(client: SharedTopicClient, config: RepositoryConfig) -> Self {
        Self {
            inner: Arc::new(RepositoryInner {
                client,
                config,
                stop: StickyEvent::shared(),
                state: Mutex::new(RepositoryState::default()),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a repository and starts its worker.
    pub fn shared(client: SharedTopicClient, config: RepositoryConfig) -> Self {
        let repository = Self::new(client, config);
        repository.start();
        repository
    }

    /// Starts the background worker. Calling it again has no effect.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            trace!("worker already started");
            return;
        }
        BatchWorker::start(self.inner.clone());
    }

    /// Stops the worker.
    ///
    /// Reads still queued, and reads issued afterwards, fail with
    /// [`TopicRepositoryError::Stopped`].
    pub async fn stop(&self) {
        self.inner.stop.notify();

        // never started: nobody else will fail the queued reads
        if !self.inner.started.swap(true, Ordering::SeqCst) {
            for request in self.inner.close().await {
                request.send(Err(TopicRepositoryError::Stopped));
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst) && !self.inner.stop.is_set()
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.inner.config
    }

    /// Creates a topic.
    ///
    /// Fails with [`TopicRepositoryError::AlreadyExists`] without calling the
    /// remote API when the topic is known, including when another create for
    /// the same name is in flight. A conflict reported by the remote is
    /// treated as success, since it usually means an earlier attempt of the
    /// same create went through.
    ///
    /// Any other remote failure releases the reserved name. A concurrent
    /// create refused with `AlreadyExists` while the name was reserved is not
    /// retried, even though the topic was never created.
    #[instrument(skip(self, request), fields(topic = %request.topic_name))]
    pub async fn create(
        &self,
        project: &str,
        service: &str,
        request: &TopicCreateRequest,
    ) -> Result<()> {
        let key = TopicKey::new(project, service, &request.topic_name);

        match self.probe(project, service, &request.topic_name, true).await {
            Ok(()) => return Err(TopicRepositoryError::AlreadyExists(key)),
            Err(TopicRepositoryError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }

        match self.inner.client.create(project, service, request).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_already_exists() => {
                debug!(%key, "remote reports conflict, topic was created");
                Ok(())
            }
            Err(err) => {
                // release the name reserved by the probe
                self.inner.state.lock().await.cache.unmark_topic(key.clone());
                Err(TopicRepositoryError::Create { key, source: err })
            }
        }
    }

    /// Reads topic details, waiting for the next batch cycle.
    ///
    /// Unknown topics fail with [`TopicRepositoryError::NotFound`] without a
    /// batch call.
    pub async fn read(&self, project: &str, service: &str, topic: &str) -> Result<TopicDetail> {
        self.read_with_cancel(project, service, topic, pending()).await
    }

    /// Same as [`read`](Self::read), giving up after `timeout`.
    ///
    /// The request stays queued and its result is discarded.
    pub async fn read_with_timeout(
        &self,
        project: &str,
        service: &str,
        topic: &str,
        timeout: Duration,
    ) -> Result<TopicDetail> {
        let deadline = async {
            sleep(timeout).await;
        };
        match self.read_with_cancel(project, service, topic, deadline).await {
            Err(TopicRepositoryError::Cancelled(key)) => {
                Err(TopicRepositoryError::Timeout(key, timeout))
            }
            result => result,
        }
    }

    /// Same as [`read`](Self::read), giving up when `cancel` completes.
    ///
    /// The request stays queued and its result is discarded.
    #[instrument(skip(self, cancel))]
    pub async fn read_with_cancel<F>(
        &self,
        project: &str,
        service: &str,
        topic: &str,
        cancel: F,
    ) -> Result<TopicDetail>
    where
        F: Future<Output = ()>,
    {
        use tokio::select;

        let key = TopicKey::new(project, service, topic);

        // the probe may wait on the lock or list the service, so it is cancellable too
        let response = async {
            let receiver = self.enqueue(project, service, topic).await?;
            match receiver.recv().await {
                Ok(result) => result,
                Err(_) => Err(TopicRepositoryError::Stopped),
            }
        };

        select! {
            _ = cancel => {
                debug!(%key, "read cancelled by caller");
                Err(TopicRepositoryError::Cancelled(key))
            },
            result = response => result,
        }
    }

    /// Updates a topic. Not cached, the call goes straight to the remote.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        project: &str,
        service: &str,
        topic: &str,
        request: &TopicUpdateRequest,
    ) -> Result<()> {
        Ok(self
            .inner
            .client
            .update(project, service, topic, request)
            .await?)
    }

    /// Deletes a topic. A topic the remote does not know is considered deleted.
    ///
    /// The topic is flipped to unknown whatever the outcome, so later
    /// reads do not trust a presence the failed call may have invalidated.
    #[instrument(skip(self))]
    pub async fn delete(&self, project: &str, service: &str, topic: &str) -> Result<()> {
        let result = self.inner.client.delete(project, service, topic).await;

        self.inner
            .state
            .lock()
            .await
            .cache
            .unmark_topic(TopicKey::new(project, service, topic));

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                debug!("topic already gone");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Checks whether a topic exists.
    ///
    /// A missing project or service also yields `false`: the remote does not
    /// tell them apart from a missing topic.
    #[instrument(skip(self))]
    pub async fn exists(&self, project: &str, service: &str, topic: &str) -> Result<bool> {
        match self.probe(project, service, topic, false).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Forgets a topic confirmed earlier, e.g. after it was deleted out of band.
    pub async fn forget_topic(&self, project: &str, service: &str, topic: &str) -> Result<()> {
        let key = TopicKey::new(project, service, topic);
        let mut state = self.inner.state.lock().await;
        if state.cache.forget_topic(&key) {
            debug!(%key, "topic forgotten");
            Ok(())
        } else {
            Err(TopicRepositoryError::NotFound(key))
        }
    }

    /// Forgets everything known about a service; the next probe lists it again.
    pub async fn forget_service(&self, project: &str, service: &str) {
        let key = ServiceKey::new(project, service);
        self.inner.state.lock().await.cache.forget_service(&key);
        debug!(service = %key, "service forgotten");
    }

    /// Confirms that a topic exists.
    ///
    /// Holds the lock for its whole run, listing included: concurrent
    /// probes of a cold service wait for one listing instead of issuing
    /// their own. With `acquire`, a topic missing from the listing is marked
    /// present anyway, reserving the name for the caller's create.
    async fn probe(&self, project: &str, service: &str, topic: &str, acquire: bool) -> Result<()> {
        let service_key = ServiceKey::new(project, service);
        let topic_key = service_key.topic(topic);

        let mut state = self.inner.state.lock().await;

        // freshly created topics are missing from listings, check the cache first
        if state.cache.is_topic_seen(&topic_key) {
            trace!(%topic_key, "cache hit");
            return Ok(());
        }

        if !state.cache.is_service_seen(&service_key) {
            debug!(service = %service_key, "listing service topics");
            let topics = self.inner.client.list(project, service).await?;
            debug!(service = %service_key, count = topics.len(), "service listed");
            state
                .cache
                .mark_service_listed(&service_key, topics.iter().map(|t| t.topic_name.as_str()));
        }

        if state.cache.is_topic_seen(&topic_key) {
            return Ok(());
        }

        if acquire {
            state.cache.mark_topic(topic_key.clone());
        }

        Err(TopicRepositoryError::NotFound(topic_key))
    }

    async fn enqueue(
        &self,
        project: &str,
        service: &str,
        topic: &str,
    ) -> Result<Receiver<ReadResult>> {
        if self.inner.stop.is_set() {
            return Err(TopicRepositoryError::Stopped);
        }

        // the batch call fails as a whole on an unknown name
        self.probe(project, service, topic, false).await?;

        let (request, receiver) = PendingRequest::new(project, service, topic);
        let mut state = self.inner.state.lock().await;
        if state.closed {
            return Err(TopicRepositoryError::Stopped);
        }
        state.queue.push(request);
        trace!(queued = state.queue.len(), "read enqueued");
        Ok(receiver)
    }
}

#[cfg(test)]
mod test {
    use kafka_topic_schema::ApiError;
    use kafka_topic_schema::memory::MemoryTopicClient;

    use super::*;

    fn repository(client: Arc<MemoryTopicClient>) -> TopicRepository {
        TopicRepository::new(client, RepositoryConfig::default())
    }

    #[fluvio_future::test]
    async fn test_probe_lists_service_once() {
        let client = Arc::new(MemoryTopicClient::new().with_topic("a", "b", "c"));
        let repository = repository(client.clone());

        repository.probe("a", "b", "c", false).await.expect("exists");
        assert!(matches!(
            repository.probe("a", "b", "x", false).await,
            Err(TopicRepositoryError::NotFound(_))
        ));
        repository.probe("a", "b", "c", false).await.expect("cached");

        assert_eq!(client.list_calls(), 1);
    }

    #[fluvio_future::test]
    async fn test_probe_acquire_reserves_name() {
        let client = Arc::new(MemoryTopicClient::new());
        let repository = repository(client.clone());

        assert!(matches!(
            repository.probe("a", "b", "c", true).await,
            Err(TopicRepositoryError::NotFound(_))
        ));
        // reserved by the first probe
        repository.probe("a", "b", "c", false).await.expect("reserved");
        // a plain probe reserves nothing
        assert!(repository.probe("a", "b", "d", false).await.is_err());
        assert!(repository.probe("a", "b", "d", false).await.is_err());
        assert_eq!(client.list_calls(), 1);
    }

    #[fluvio_future::test]
    async fn test_probe_listing_error_is_not_cached() {
        let client = Arc::new(
            MemoryTopicClient::new()
                .with_list_error(ApiError::remote("ServiceKafkaTopicList", 500, "bla bla bla")),
        );
        let repository = repository(client.clone());

        let err = repository
            .probe("a", "b", "c", false)
            .await
            .expect_err("listing fails");
        assert_eq!(err.to_string(), "[500 ServiceKafkaTopicList]: bla bla bla");
        assert!(repository.probe("a", "b", "c", false).await.is_err());
        // service was not marked as listed
        assert_eq!(client.list_calls(), 2);
    }

    #[fluvio_future::test]
    async fn test_withdraw_empties_queue() {
        let client = Arc::new(MemoryTopicClient::new().with_topic("a", "b", "c"));
        let repository = repository(client);

        assert!(repository.inner.withdraw().await.is_none());
        let _first = repository.enqueue("a", "b", "c").await.expect("queued");
        let _second = repository.enqueue("a", "b", "c").await.expect("queued");

        let queue = repository.inner.withdraw().await.expect("drained");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[&TopicKey::new("a", "b", "c")].len(), 2);
        assert!(repository.inner.withdraw().await.is_none());
    }

    #[fluvio_future::test]
    async fn test_enqueue_after_close() {
        let client = Arc::new(MemoryTopicClient::new().with_topic("a", "b", "c"));
        let repository = repository(client);

        assert!(repository.inner.close().await.is_empty());
        assert!(matches!(
            repository.enqueue("a", "b", "c").await,
            Err(TopicRepositoryError::Stopped)
        ));
    }
}
