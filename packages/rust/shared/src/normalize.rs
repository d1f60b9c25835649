//! Identifier normalization.
//!
//! Compound identity is fuzzy on purpose: raw names that differ only in case,
//! punctuation, or a trailing annotation after the first `:` or `,` collapse to
//! the same [`NormalizationKey`]. Group labels get a lighter treatment, see
//! [`normalize_group`].

use crate::types::NormalizationKey;

/// Canonicalize a raw compound name into its lookup key.
///
/// Keeps the segment before the first `:` or `,`, trims it, drops every
/// character that is not an ASCII letter, ASCII digit, or hyphen, and
/// uppercases the rest. Total: never fails, same input gives the same key.
pub fn normalize(raw: &str) -> NormalizationKey {
    let primary = raw.split([':', ',']).next().unwrap_or_default().trim();

    let key: String = primary
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    NormalizationKey::from_normalized(key)
}

/// Canonicalize a group label for identity comparison (uppercase + trim).
///
/// Stricter than [`normalize`]: punctuation and spacing inside the label are
/// kept, because the oracle echoes group labels verbatim.
pub fn normalize_group(name: &str) -> String {
    name.trim().to_uppercase()
}
