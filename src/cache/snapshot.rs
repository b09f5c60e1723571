use std::sync::Arc;

/// Everything known about one resource after its last successful fetch.
///
/// Built completely before it is published and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    /// Origin entity tag, if the origin sent one
    pub token: Option<String>,
    /// Body exactly as received
    pub raw_body: Arc<str>,
    pub records: Arc<[T]>,
    /// Origin-supplied recency marker
    pub timestamp: Option<i64>,
}

impl<T> Snapshot<T> {
    #[must_use]
    pub fn new(token: Option<String>, raw_body: String, records: Vec<T>, timestamp: Option<i64>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
            raw_body: raw_body.into(),
            records: records.into(),
            timestamp,
        }
    }

    /// The value a slot holds before its first successful fetch.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            token: None,
            raw_body: Arc::from(""),
            records: Arc::from(Vec::new()),
            timestamp: None,
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// True when `caller_token` is non-empty and identical to ours.
    #[must_use]
    pub fn matches(&self, caller_token: Option<&str>) -> bool {
        match (caller_token, self.token()) {
            (Some(theirs), Some(ours)) => !theirs.is_empty() && theirs == ours,
            _ => false,
        }
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let snapshot: Snapshot<u8> = Snapshot::empty();
        assert!(snapshot.records.is_empty());
        assert_eq!(snapshot.token(), None);
        assert_eq!(snapshot.timestamp, None);
        assert_eq!(&*snapshot.raw_body, "");
    }

    #[test]
    fn test_token_matching() {
        let snapshot = Snapshot::new(Some("abc".to_string()), String::new(), vec![1], None);
        assert!(snapshot.matches(Some("abc")));
        assert!(!snapshot.matches(Some("ABC")));
        assert!(!snapshot.matches(Some("")));
        assert!(!snapshot.matches(None));
    }

    #[test]
    fn test_empty_tokens_never_match() {
        let snapshot = Snapshot::new(Some(String::new()), String::new(), vec![1], None);
        assert_eq!(snapshot.token(), None);
        assert!(!snapshot.matches(Some("")));

        let empty: Snapshot<u8> = Snapshot::empty();
        assert!(!empty.matches(Some("abc")));
    }
}
