//! Ordered group container.
//!
//! Groups are kept in creation order so persisted output is deterministic.
//! Labels are matched through [`normalize_group`], so `Fatty Acids` and
//! `FATTY ACIDS ` name the same group; the label that created a group is the
//! one it keeps. Groups are never removed, even when a move empties them.

use lipidsort_shared::{Group, normalize_group};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupStore {
    groups: Vec<Group>,
}

impl GroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Look up a group by label (case-insensitive, trimmed).
    pub fn find(&self, label: &str) -> Option<&Group> {
        self.position(label).map(|idx| &self.groups[idx])
    }

    /// The group currently holding `raw`, if any.
    pub fn group_of(&self, raw: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.contains(raw))
    }

    /// Whether `raw` is a member of the group labelled `label`.
    pub fn holds(&self, label: &str, raw: &str) -> bool {
        self.find(label).is_some_and(|g| g.contains(raw))
    }

    /// Append `raw` to `label`, creating the group if needed.
    /// Returns `false` if it was already a member there.
    pub(crate) fn insert(&mut self, label: &str, raw: &str) -> bool {
        let idx = self.ensure(label);
        let group = &mut self.groups[idx];
        if group.contains(raw) {
            return false;
        }
        group.members.push(raw.to_string());
        true
    }

    /// Remove `raw` from `label`. Returns `false` if it was not there.
    pub(crate) fn remove(&mut self, label: &str, raw: &str) -> bool {
        let Some(idx) = self.position(label) else {
            return false;
        };
        let members = &mut self.groups[idx].members;
        match members.iter().position(|m| m == raw) {
            Some(pos) => {
                members.remove(pos);
                true
            }
            None => false,
        }
    }

    fn position(&self, label: &str) -> Option<usize> {
        let wanted = normalize_group(label);
        self.groups
            .iter()
            .position(|g| normalize_group(&g.name) == wanted)
    }

    fn ensure(&mut self, label: &str) -> usize {
        match self.position(label) {
            Some(idx) => idx,
            None => {
                self.groups.push(Group::new(label.trim()));
                self.groups.len() - 1
            }
        }
    }
}
