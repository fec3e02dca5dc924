use std::collections::HashMap;

use async_channel::{Receiver, Sender, bounded};
use tracing::trace;

use kafka_topic_schema::topic::TopicDetail;

use crate::error::Result;
use crate::key::{ServiceKey, TopicKey};

pub(crate) type ReadResult = Result<TopicDetail>;

/// Drained requests keyed by topic; several callers may wait on the same topic.
pub(crate) type RequestQueue = HashMap<TopicKey, Vec<PendingRequest>>;

/// A read waiting for the next batch cycle
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub project: String,
    pub service: String,
    pub topic: String,
    sender: Sender<ReadResult>,
}

impl PendingRequest {
    /// Returns the request and the receiving end of its private response slot.
    pub fn new(project: &str, service: &str, topic: &str) -> (Self, Receiver<ReadResult>) {
        let (sender, receiver) = bounded(1);
        let request = Self {
            project: project.to_owned(),
            service: service.to_owned(),
            topic: topic.to_owned(),
            sender,
        };
        (request, receiver)
    }

    pub fn key(&self) -> TopicKey {
        TopicKey::new(&self.project, &self.service, &self.topic)
    }

    pub fn service_key(&self) -> ServiceKey {
        ServiceKey::new(&self.project, &self.service)
    }

    /// Resolves the request. Consumes it, so a request is answered at most once.
    pub fn send(self, result: ReadResult) {
        if self.sender.try_send(result).is_err() {
            trace!(topic = %self.key(), "reader is gone, dropping result");
        }
    }
}

/// groups drained requests by topic key
pub(crate) fn into_queue(requests: Vec<PendingRequest>) -> RequestQueue {
    let mut queue: RequestQueue = HashMap::with_capacity(requests.len());
    for request in requests {
        queue.entry(request.key()).or_default().push(request);
    }
    queue
}
