//! Counter key generation.

use chrono::NaiveDate;

/// A key that uniquely identifies a daily counter.
///
/// Two requests share a key iff they come from the same client on the
/// same calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// The client identity, normally a source IP address
    client: String,
    /// The calendar day the counter belongs to
    day: NaiveDate,
}

impl CounterKey {
    /// Create a new counter key for a client on a given day.
    pub fn new(client: &str, day: NaiveDate) -> Self {
        Self {
            client: client.to_string(),
            day,
        }
    }

    /// The client identity.
    pub fn client(&self) -> &str {
        &self.client
    }

    /// The calendar day.
    pub fn day(&self) -> NaiveDate {
        self.day
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.client, self.day)
    }
}
