//! Mutable state of one sort run.
//!
//! A [`SessionState`] is created from the full input list, owned by the
//! controller for the life of the run and discarded after the last persist.

use std::collections::{HashMap, HashSet};

use lipidsort_shared::{Compound, NormalizationKey, normalize};
use tracing::{debug, warn};

use crate::parser::{self, LineOutcome, MutationCommand, Warning};
use crate::store::GroupStore;

/// Compounds per oracle round trip.
pub const BATCH_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// KnownCompounds
// ---------------------------------------------------------------------------

/// Key -> raw name index over the whole input.
///
/// When two raw names share a key the first one listed wins. A second,
/// hyphen-insensitive index lets `trans2hexenal` find `TRANS-2-HEXENAL`.
#[derive(Debug, Clone, Default)]
pub struct KnownCompounds {
    by_key: HashMap<NormalizationKey, String>,
    by_loose: HashMap<String, NormalizationKey>,
}

impl KnownCompounds {
    pub fn from_compounds(compounds: &[Compound]) -> Self {
        let mut known = Self::default();
        for compound in compounds {
            if compound.key.is_empty() || known.by_key.contains_key(&compound.key) {
                continue;
            }
            known
                .by_loose
                .entry(compound.key.without_hyphens())
                .or_insert_with(|| compound.key.clone());
            known
                .by_key
                .insert(compound.key.clone(), compound.raw.clone());
        }
        known
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn contains(&self, key: &NormalizationKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// Canonical raw name for a key.
    pub fn raw_name(&self, key: &NormalizationKey) -> Option<&str> {
        self.by_key.get(key).map(String::as_str)
    }

    /// Normalize `text` and find the input compound it names.
    pub fn resolve(&self, text: &str) -> Option<NormalizationKey> {
        let key = normalize(text);
        if key.is_empty() {
            return None;
        }
        if self.by_key.contains_key(&key) {
            return Some(key);
        }
        self.by_loose.get(&key.without_hyphens()).cloned()
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Result of applying one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Assigned,
    Moved,
    Skipped(Warning),
}

/// Tally for one oracle reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyOutcome {
    pub assigned: usize,
    pub moved: usize,
    pub warnings: Vec<Warning>,
}

impl ReplyOutcome {
    /// Commands that changed the store.
    pub fn applied(&self) -> usize {
        self.assigned + self.moved
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    store: GroupStore,
    sorted: HashSet<NormalizationKey>,
    pending: Vec<Compound>,
    known: KnownCompounds,
}

impl SessionState {
    /// Start a session over `compounds`; every one of them is pending.
    pub fn new(compounds: Vec<Compound>) -> Self {
        Self {
            store: GroupStore::new(),
            sorted: HashSet::new(),
            known: KnownCompounds::from_compounds(&compounds),
            pending: compounds,
        }
    }

    pub fn store(&self) -> &GroupStore {
        &self.store
    }

    pub fn known(&self) -> &KnownCompounds {
        &self.known
    }

    pub fn pending(&self) -> &[Compound] {
        &self.pending
    }

    pub fn sorted_count(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_sorted(&self, key: &NormalizationKey) -> bool {
        self.sorted.contains(key)
    }

    /// The head of the pending queue, at most [`BATCH_SIZE`] compounds.
    pub fn next_batch(&self) -> Vec<Compound> {
        self.pending.iter().take(BATCH_SIZE).cloned().collect()
    }

    /// Drop every pending compound whose key has been sorted.
    pub fn refresh_pending(&mut self) {
        let sorted = &self.sorted;
        self.pending.retain(|c| !sorted.contains(&c.key));
    }

    /// Make `missing` the pending queue again for a repair pass.
    ///
    /// Anything the session still believes is placed is forgotten first, so
    /// the oracle can place it afresh.
    pub fn reseed(&mut self, missing: &[Compound]) {
        for compound in missing {
            if self.sorted.remove(&compound.key) {
                if let Some(raw) = self.known.raw_name(&compound.key) {
                    if let Some(label) = self.store.group_of(raw).map(|g| g.name.clone()) {
                        self.store.remove(&label, raw);
                    }
                }
            }
        }
        self.pending = missing.to_vec();
    }

    /// Apply one command, re-checking it against the current state.
    pub fn apply(&mut self, command: &MutationCommand) -> ApplyOutcome {
        match command {
            MutationCommand::Assign { key, group } => {
                let Some(raw) = self.known.raw_name(key) else {
                    return ApplyOutcome::Skipped(Warning::Unrecognized {
                        compound: key.to_string(),
                    });
                };
                if self.sorted.contains(key) {
                    return ApplyOutcome::Skipped(Warning::AlreadySorted {
                        compound: raw.to_string(),
                    });
                }
                let raw = raw.to_string();
                self.store.insert(group, &raw);
                self.sorted.insert(key.clone());
                debug!(compound = %raw, group = %group, "assigned");
                ApplyOutcome::Assigned
            }
            MutationCommand::Move { key, from, to } => {
                let Some(raw) = self.known.raw_name(key).map(str::to_string) else {
                    return ApplyOutcome::Skipped(Warning::Unrecognized {
                        compound: key.to_string(),
                    });
                };
                if !self.store.remove(from, &raw) {
                    return ApplyOutcome::Skipped(Warning::MoveFailed {
                        compound: raw,
                        group: from.clone(),
                    });
                }
                self.store.insert(to, &raw);
                self.sorted.insert(key.clone());
                debug!(compound = %raw, from = %from, to = %to, "moved");
                ApplyOutcome::Moved
            }
        }
    }

    /// Parse and apply a reply line by line, in textual order.
    ///
    /// Each line is validated against the state left by the lines before it,
    /// so a reply may assign a compound and then move it. Warnings are logged
    /// and returned.
    pub fn apply_reply(&mut self, text: &str) -> ReplyOutcome {
        let mut outcome = ReplyOutcome::default();

        for line in text.lines() {
            let skipped = match parser::parse_line(line, self) {
                LineOutcome::Blank => None,
                LineOutcome::Warning(w) => Some(w),
                LineOutcome::Command(cmd) => match self.apply(&cmd) {
                    ApplyOutcome::Assigned => {
                        outcome.assigned += 1;
                        None
                    }
                    ApplyOutcome::Moved => {
                        outcome.moved += 1;
                        None
                    }
                    ApplyOutcome::Skipped(w) => Some(w),
                },
            };

            if let Some(w) = skipped {
                warn!("{w}");
                outcome.warnings.push(w);
            }
        }

        outcome
    }
}
