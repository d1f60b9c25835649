//! Core domain types for lipidsort.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::normalize;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one sort run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// NormalizationKey
// ---------------------------------------------------------------------------

/// Canonical identity of a compound, derived from its raw name.
///
/// Only [`crate::normalize`] constructs keys, so every key in the system went
/// through the same canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizationKey(String);

impl NormalizationKey {
    pub(crate) fn from_normalized(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key with hyphens removed, for hyphen-insensitive lookups.
    pub fn without_hyphens(&self) -> String {
        self.0.replace('-', "")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for NormalizationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Compound
// ---------------------------------------------------------------------------

/// A compound as listed in the source file: the raw display name plus its
/// derived key. The raw name is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compound {
    pub raw: String,
    pub key: NormalizationKey,
}

impl Compound {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let key = normalize(&raw);
        Self { raw, key }
    }

    /// The name shown to the oracle: the raw name up to its first colon.
    pub fn display_name(&self) -> &str {
        self.raw.split(':').next().unwrap_or_default()
    }
}

impl std::fmt::Display for Compound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A named bucket of compounds, members held by raw name in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Label as first given by the oracle (or seed file).
    pub name: String,
    /// Raw compound names.
    #[serde(default)]
    pub members: Vec<String>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.members.iter().any(|m| m == raw)
    }
}
