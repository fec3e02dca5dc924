//! Topic objects exchanged with the remote API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{PartitionCount, ReplicationFactor, TopicName};

/// Kafka topic configuration, keyed by the Kafka config name (`cleanup_policy`, `retention_ms`, ...)
pub type TopicConfig = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopicState {
    #[default]
    Active,
    Configuring,
    Deleting,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopicTag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicCreateRequest {
    pub topic_name: TopicName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions: Option<PartitionCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication: Option<ReplicationFactor>,
    #[serde(default, skip_serializing_if = "TopicConfig::is_empty")]
    pub config: TopicConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TopicTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_user_group_id: Option<String>,
}

impl TopicCreateRequest {
    pub fn new(topic_name: impl Into<TopicName>) -> Self {
        Self {
            topic_name: topic_name.into(),
            ..Default::default()
        }
    }

    pub fn with_partitions(mut self, partitions: PartitionCount) -> Self {
        self.partitions = Some(partitions);
        self
    }

    pub fn with_replication(mut self, replication: ReplicationFactor) -> Self {
        self.replication = Some(replication);
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions: Option<PartitionCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication: Option<ReplicationFactor>,
    #[serde(default, skip_serializing_if = "TopicConfig::is_empty")]
    pub config: TopicConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TopicTag>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_user_group_id: Option<String>,
}

/// Entry of the per-service topic listing
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub topic_name: TopicName,
    #[serde(default)]
    pub partitions: PartitionCount,
    #[serde(default)]
    pub replication: ReplicationFactor,
    #[serde(default)]
    pub state: TopicState,
}

/// Full topic description returned by the batch detail call
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDetail {
    pub topic_name: TopicName,
    #[serde(default)]
    pub partitions: PartitionCount,
    #[serde(default)]
    pub replication: ReplicationFactor,
    #[serde(default)]
    pub state: TopicState,
    #[serde(default, skip_serializing_if = "TopicConfig::is_empty")]
    pub config: TopicConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TopicTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_user_group_id: Option<String>,
}

impl TopicDetail {
    pub fn new(topic_name: impl Into<TopicName>) -> Self {
        Self {
            topic_name: topic_name.into(),
            ..Default::default()
        }
    }

    /// apply update on top of current detail
    pub fn apply(&mut self, update: &TopicUpdateRequest) {
        if let Some(partitions) = update.partitions {
            self.partitions = partitions;
        }
        if let Some(replication) = update.replication {
            self.replication = replication;
        }
        for (key, value) in &update.config {
            self.config.insert(key.clone(), value.clone());
        }
        if let Some(tags) = &update.tags {
            self.tags = tags.clone();
        }
        if let Some(description) = &update.topic_description {
            self.topic_description = Some(description.clone());
        }
        if let Some(group) = &update.owner_user_group_id {
            self.owner_user_group_id = Some(group.clone());
        }
    }
}

impl From<&TopicCreateRequest> for TopicDetail {
    fn from(request: &TopicCreateRequest) -> Self {
        Self {
            topic_name: request.topic_name.clone(),
            partitions: request.partitions.unwrap_or(1),
            replication: request.replication.unwrap_or(1),
            state: TopicState::Active,
            config: request.config.clone(),
            tags: request.tags.clone(),
            topic_description: request.topic_description.clone(),
            owner_user_group_id: request.owner_user_group_id.clone(),
        }
    }
}

impl From<&TopicDetail> for TopicSummary {
    fn from(detail: &TopicDetail) -> Self {
        Self {
            topic_name: detail.topic_name.clone(),
            partitions: detail.partitions,
            replication: detail.replication,
            state: detail.state.clone(),
        }
    }
}
