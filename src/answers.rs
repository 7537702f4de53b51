//! Answer set resolving catalog questions
//!
//! Answers arrive from outside the descriptor (CLI flags, an answers file,
//! or an orchestrator UI) and are consulted by the interpolation and
//! parameter-assignment processors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from question key to answer.
///
/// Keys are normalized to ASCII lower case with underscores removed, so
/// `cluster_id`, `clusterId` and `clusterid` all address the same slot.
/// Backed by an ordered map so iteration and serialization stay
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet {
    entries: BTreeMap<String, String>,
}

/// Normalized form of an answer key.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl AnswerSet {
    /// Create an empty answer set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an answer, replacing any entry under the same normalized key.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries.insert(normalize_key(key), value.into());
    }

    /// Look up an answer; the key is normalized before the lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&normalize_key(key)).map(|s| s.as_str())
    }

    /// True when an answer exists for the key.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&normalize_key(key))
    }

    /// Number of answers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no answers are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over normalized key/answer pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy every answer from `other` into this set, overriding collisions.
    pub fn merge(&mut self, other: &AnswerSet) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut answers = AnswerSet::new();
        for (k, v) in iter {
            answers.insert(k.as_ref(), v);
        }
        answers
    }
}

impl AnswerSet {
    /// Rebuild the set with normalized keys.
    ///
    /// Transparent deserialization keeps the keys as spelled in the source;
    /// callers that load answers from files run the result through this.
    pub fn normalized(self) -> Self {
        let mut answers = AnswerSet::new();
        for (k, v) in self.entries {
            answers.insert(&k, v);
        }
        answers
    }
}
