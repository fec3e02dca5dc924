use std::time::Duration;

use kafka_topic_schema::ApiError;

use crate::key::TopicKey;
use crate::retry::RetryError;

pub type Result<T, E = TopicRepositoryError> = core::result::Result<T, E>;

/// Possible errors returned by the topic repository
#[derive(thiserror::Error, Debug, Clone)]
pub enum TopicRepositoryError {
    #[error("Topic not found: {0}")]
    NotFound(TopicKey),
    #[error("Topic conflict, already exists: {0}")]
    AlreadyExists(TopicKey),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to create topic {key}: {source}")]
    Create {
        key: TopicKey,
        #[source]
        source: ApiError,
    },
    #[error("topic read error: {0}")]
    TopicRead(#[from] RetryError<BatchError>),
    #[error("gave up waiting for topic {0} after {1:?}")]
    Timeout(TopicKey, Duration),
    #[error("read of topic {0} was cancelled")]
    Cancelled(TopicKey),
    #[error("topic repository is stopped")]
    Stopped,
    #[error("invalid repository config: {0}")]
    Config(String),
}

impl TopicRepositoryError {
    /// True when the project, service or topic does not exist,
    /// looking through any context added by the repository.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api(err) | Self::Create { source: err, .. } => err.is_not_found(),
            Self::TopicRead(err) => err
                .last()
                .and_then(BatchError::api_error)
                .is_some_and(ApiError::is_not_found),
            _ => false,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::AlreadyExists(_) => true,
            Self::Api(err) | Self::Create { source: err, .. } => err.is_already_exists(),
            _ => false,
        }
    }
}

/// Failure of a single batch detail call
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// a topic vanished between the existence probe and the batch call
    #[error("topic list has changed: {0}")]
    TopicListChanged(ApiError),
    #[error(transparent)]
    Remote(ApiError),
    #[error("got {received} topics, expected {expected}. Retrying")]
    Incomplete { received: usize, expected: usize },
    #[error("topic {0} is missing from the batch response")]
    MissingTopic(String),
}

impl BatchError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::TopicListChanged(err) | Self::Remote(err) => Some(err),
            _ => None,
        }
    }
}
