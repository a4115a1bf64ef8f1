//! Core-agent version wrapper with semantic-version ordering.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use tracing::warn;

/// Semantic version of the core-agent binary, as configured.
///
/// Keeps the raw configured string alongside the parsed numeric parts.
/// A leading `v` is tolerated (`v1.2.7` and `1.2.7` compare equal);
/// unparsable input degrades to `0.0.0` with a warning rather than
/// failing agent setup.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CoreAgentVersion {
    raw: String,
    parts: (u64, u64, u64),
}

impl CoreAgentVersion {
    /// Parse a version string, stripping any leading `v`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_start_matches('v');
        let mut nums = trimmed.split('.').map(|p| p.parse::<u64>());

        let parts = match (nums.next(), nums.next(), nums.next()) {
            (Some(Ok(major)), Some(Ok(minor)), Some(Ok(patch))) => (major, minor, patch),
            _ => {
                warn!(version = raw, "unparsable core agent version, treating as 0.0.0");
                (0, 0, 0)
            }
        };

        Self {
            raw: raw.to_owned(),
            parts,
        }
    }

    /// The version string exactly as configured.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The numeric version without any `v` prefix, e.g. `1.2.7`.
    #[must_use]
    pub fn numeric(&self) -> String {
        format!("{}.{}.{}", self.parts.0, self.parts.1, self.parts.2)
    }

    /// Parsed `(major, minor, patch)` parts.
    #[must_use]
    pub fn parts(&self) -> (u64, u64, u64) {
        self.parts
    }
}

impl Display for CoreAgentVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Ord for CoreAgentVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl PartialOrd for CoreAgentVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
