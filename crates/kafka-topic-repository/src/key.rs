use std::fmt;

const KEY_SEPARATOR: &str = "/";

/// builds a path-like key from the given parts
fn join_key(parts: &[&str]) -> String {
    parts.join(KEY_SEPARATOR)
}

/// Identity of a Kafka service: `project/service`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceKey(String);

impl ServiceKey {
    pub fn new(project: &str, service: &str) -> Self {
        Self(join_key(&[project, service]))
    }

    /// Prefix shared by the keys of every topic in this service.
    pub fn topic_prefix(&self) -> String {
        format!("{}{KEY_SEPARATOR}", self.0)
    }

    pub fn topic(&self, topic: &str) -> TopicKey {
        TopicKey(join_key(&[&self.0, topic]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a topic: `project/service/topic`.
///
/// Keys are only compared and prefix-matched, never split back into parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicKey(String);

impl TopicKey {
    pub fn new(project: &str, service: &str, topic: &str) -> Self {
        Self(join_key(&[project, service, topic]))
    }

    pub fn belongs_to(&self, service: &ServiceKey) -> bool {
        self.0.starts_with(&service.topic_prefix())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keys() {
        let service = ServiceKey::new("p", "s");
        assert_eq!(service.as_str(), "p/s");
        assert_eq!(service.topic("t"), TopicKey::new("p", "s", "t"));
        assert_eq!(TopicKey::new("p", "s", "t").to_string(), "p/s/t");
    }

    #[test]
    fn test_prefix_does_not_match_sibling_service() {
        let service = ServiceKey::new("p", "s");
        assert!(TopicKey::new("p", "s", "x").belongs_to(&service));
        assert!(!TopicKey::new("p", "s2", "x").belongs_to(&service));
        assert!(!TopicKey::new("p", "other", "x").belongs_to(&service));
    }
}
