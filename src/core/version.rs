//! Dotted-numeric version handling.
//!
//! Package indexes and `--version` banners report versions such as `3.9`,
//! `3.12` or `24.0.7`. These are compared component by component as
//! integers, never as strings, so `3.10` sorts above `3.9`.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};

static VERSION_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)+)").expect("valid version regex"));

/// A version string together with its parsed numeric components.
#[derive(Debug, Clone)]
pub struct VersionCandidate {
    raw: String,
    parts: Vec<u64>,
}

impl VersionCandidate {
    /// Parse a dotted-numeric version (`3`, `3.12`, `24.0.7`).
    ///
    /// A leading `v` is accepted. Returns `None` for anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if digits.is_empty() {
            return None;
        }

        let parts = digits
            .split('.')
            .map(|p| p.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        Some(VersionCandidate {
            raw: trimmed.to_string(),
            parts,
        })
    }

    /// Find the first dotted version inside free-form text such as
    /// `Docker version 24.0.7, build afdd53b`.
    pub fn find_in(text: &str) -> Option<Self> {
        VERSION_IN_TEXT
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| VersionCandidate::parse(m.as_str()))
    }

    /// The original string.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The numeric components.
    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// Whether this version is at least `minimum`.
    pub fn satisfies(&self, minimum: &VersionCandidate) -> bool {
        self >= minimum
    }
}

impl PartialEq for VersionCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionCandidate {}

impl PartialOrd for VersionCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionCandidate {
    /// Missing trailing components compare as zero: `3.10 == 3.10.0`.
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for VersionCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for VersionCandidate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Pick the highest version among `candidates`, ignoring unparsable entries.
pub fn select_latest<I, S>(candidates: I) -> Option<VersionCandidate>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    candidates
        .into_iter()
        .filter_map(|c| VersionCandidate::parse(c.as_ref()))
        .max()
}
