use std::collections::HashMap;

use crate::key::{ServiceKey, TopicKey};

const DEFAULT_SEEN_TOPICS_CAPACITY: usize = 1000;
const DEFAULT_SEEN_SERVICES_CAPACITY: usize = 10;

/// Local knowledge of which topics exist.
///
/// `true` means confirmed present, by a listing or by a create issued through
/// the repository. Topic entries are never removed, only flipped to `false`.
#[derive(Debug)]
pub(crate) struct ExistenceCache {
    seen_topics: HashMap<TopicKey, bool>,
    // services that have been listed at least once
    seen_services: HashMap<ServiceKey, bool>,
}

impl Default for ExistenceCache {
    fn default() -> Self {
        Self {
            seen_topics: HashMap::with_capacity(DEFAULT_SEEN_TOPICS_CAPACITY),
            seen_services: HashMap::with_capacity(DEFAULT_SEEN_SERVICES_CAPACITY),
        }
    }
}

impl ExistenceCache {
    pub fn is_topic_seen(&self, key: &TopicKey) -> bool {
        self.seen_topics.get(key).copied().unwrap_or_default()
    }

    pub fn is_service_seen(&self, key: &ServiceKey) -> bool {
        self.seen_services.get(key).copied().unwrap_or_default()
    }

    pub fn mark_topic(&mut self, key: TopicKey) {
        self.seen_topics.insert(key, true);
    }

    /// records a full listing of the service
    pub fn mark_service_listed<I>(&mut self, service: &ServiceKey, topic_names: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for name in topic_names {
            self.mark_topic(service.topic(name.as_ref()));
        }
        self.seen_services.insert(service.clone(), true);
    }

    /// Flips the topic to unknown. Returns false if it was not confirmed.
    pub fn forget_topic(&mut self, key: &TopicKey) -> bool {
        match self.seen_topics.get_mut(key) {
            Some(seen) if *seen => {
                *seen = false;
                true
            }
            _ => false,
        }
    }

    /// flips the topic to unknown whether or not it was known
    pub fn unmark_topic(&mut self, key: TopicKey) {
        self.seen_topics.insert(key, false);
    }

    /// Forces the next probe of this service to list it again.
    pub fn forget_service(&mut self, service: &ServiceKey) {
        if let Some(seen) = self.seen_services.get_mut(service) {
            *seen = false;
        }

        for (key, seen) in self.seen_topics.iter_mut() {
            if key.belongs_to(service) {
                *seen = false;
            }
        }
    }

    #[cfg(test)]
    pub fn topic_entries(&self) -> usize {
        self.seen_topics.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_listing_marks_topics_and_service() {
        let mut cache = ExistenceCache::default();
        let service = ServiceKey::new("p", "s");
        assert!(!cache.is_service_seen(&service));

        cache.mark_service_listed(&service, ["a", "b"]);

        assert!(cache.is_service_seen(&service));
        assert!(cache.is_topic_seen(&TopicKey::new("p", "s", "a")));
        assert!(cache.is_topic_seen(&TopicKey::new("p", "s", "b")));
        assert!(!cache.is_topic_seen(&TopicKey::new("p", "s", "c")));
    }

    #[test]
    fn test_forget_topic() {
        let mut cache = ExistenceCache::default();
        let key = TopicKey::new("p", "s", "a");

        assert!(!cache.forget_topic(&key));
        cache.mark_topic(key.clone());
        assert!(cache.forget_topic(&key));
        assert!(!cache.is_topic_seen(&key));
        // already unknown
        assert!(!cache.forget_topic(&key));
        assert_eq!(cache.topic_entries(), 1);
    }

    #[test]
    fn test_forget_service_only_touches_its_prefix() {
        let mut cache = ExistenceCache::default();
        let service = ServiceKey::new("p", "s");
        let other = ServiceKey::new("p", "other");
        cache.mark_service_listed(&service, ["x"]);
        cache.mark_service_listed(&other, ["x"]);

        cache.forget_service(&service);

        assert!(!cache.is_service_seen(&service));
        assert!(!cache.is_topic_seen(&TopicKey::new("p", "s", "x")));
        assert!(cache.is_service_seen(&other));
        assert!(cache.is_topic_seen(&TopicKey::new("p", "other", "x")));
        assert_eq!(cache.topic_entries(), 2);
    }

    #[test]
    fn test_unmark_keeps_entry() {
        let mut cache = ExistenceCache::default();
        let key = TopicKey::new("p", "s", "a");
        cache.unmark_topic(key.clone());
        assert!(!cache.is_topic_seen(&key));
        assert_eq!(cache.topic_entries(), 1);
    }
}
