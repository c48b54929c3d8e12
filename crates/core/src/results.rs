use std::collections::BTreeMap;

/// Affirmative detection result. Downstream consumers of the provider
/// catalog match on the literal string, so the spelling is load-bearing.
pub const YES: &str = "Yes";
/// Negative detection result.
pub const NO: &str = "No";

/// Detection results accumulated over one provider run.
///
/// Keys are case-insensitively unique and the last writer for a key wins,
/// including its spelling. Iteration visits entries in case-insensitive
/// lexicographic key order regardless of insertion order, so serialized
/// output is stable across runs.
#[derive(Debug, Clone, Default)]
pub struct ProbeResults {
    // lowercased key -> (key as last written, value)
    entries: BTreeMap<String, (String, String)>,
}

impl ProbeResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .insert(key.to_ascii_lowercase(), (key.to_string(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in case-insensitive lexicographic key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}
