//! Result of a quota check.

/// Whether a request may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The request is within today's quota and has been counted
    Admit,
    /// The quota is exhausted; the request was not counted
    Deny,
}

/// The outcome of a quota check together with the values reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Admit or deny
    pub outcome: Outcome,
    /// The daily limit in force
    pub limit: u64,
    /// Admissions left today after this one, always in `0..=limit`
    pub remaining: u64,
}

impl Decision {
    pub(crate) fn admit(limit: u64, count: u64) -> Self {
        Self {
            outcome: Outcome::Admit,
            limit,
            remaining: limit.saturating_sub(count),
        }
    }

    pub(crate) fn deny(limit: u64) -> Self {
        Self {
            outcome: Outcome::Deny,
            limit,
            remaining: 0,
        }
    }

    /// Returns `true` if the request was admitted.
    pub fn is_admitted(&self) -> bool {
        self.outcome == Outcome::Admit
    }
}
