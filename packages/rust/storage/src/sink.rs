//! The grouped result file.
//!
//! Format, one block per group:
//!
//! ```text
//! Fatty Acids:
//! Oleic Acid, Palmitic Acid
//!
//! Sterols:
//! Cholesterol
//!
//! ```
//!
//! The first persist of a run truncates the file. Later persists only append
//! blocks for compounds whose placement changed, so the file is an append log
//! and readers resolve a member to the group of its last block.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use lipidsort_shared::{Group, LipidSortError, Result};
use tracing::{debug, info};

use crate::ensure_parent;

/// Separator between members on a block's member line.
const MEMBER_SEPARATOR: &str = ", ";

/// Render one group block.
pub fn render_block(name: &str, members: &[String]) -> String {
    format!("{name}:\n{}\n\n", members.join(MEMBER_SEPARATOR))
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Append-log writer for one sort run.
#[derive(Debug)]
pub struct SortSink {
    path: PathBuf,
    /// member raw name -> group it was last written under
    placed: HashMap<String, String>,
    started: bool,
}

impl SortSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            placed: HashMap::new(),
            started: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop the recorded placement of `raw`, so the next persist writes it
    /// again even under the same group.
    pub fn forget(&mut self, raw: &str) {
        if let Some(group) = self.placed.remove(raw) {
            debug!(member = raw, %group, "forgot sink placement");
        }
    }

    /// Persist the current groups. Returns the number of blocks written.
    ///
    /// First call: truncate and write every group, empty ones included.
    /// Later calls: append a block per group listing only members that are
    /// not already recorded under that group.
    pub fn persist(&mut self, groups: &[Group]) -> Result<usize> {
        let mut out = String::new();
        let mut blocks = 0;

        for group in groups {
            let fresh: Vec<String> = group
                .members
                .iter()
                .filter(|m| self.placed.get(*m) != Some(&group.name))
                .cloned()
                .collect();

            if self.started && fresh.is_empty() {
                continue;
            }

            out.push_str(&render_block(&group.name, &fresh));
            blocks += 1;

            for member in fresh {
                self.placed.insert(member, group.name.clone());
            }
        }

        ensure_parent(&self.path)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.started)
            .truncate(!self.started)
            .open(&self.path)
            .map_err(|e| LipidSortError::io(&self.path, e))?;

        file.write_all(out.as_bytes())
            .map_err(|e| LipidSortError::io(&self.path, e))?;

        if self.started {
            debug!(path = %self.path.display(), blocks, "appended to sink");
        } else {
            info!(path = %self.path.display(), blocks, "wrote sink");
        }
        self.started = true;

        Ok(blocks)
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Parsed sink file: blocks in file order, repeated group names allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkContents {
    pub blocks: Vec<Group>,
}

impl SinkContents {
    /// Every member name across all blocks, in file order (may repeat).
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .iter()
            .flat_map(|b| b.members.iter().map(String::as_str))
    }

    /// Final groups after replaying the log: blocks with the same name are
    /// merged and each member stays only in the group of its last block.
    /// Groups keep first-appearance order; emptied groups are kept.
    pub fn merged_groups(&self) -> Vec<Group> {
        let mut last_home: HashMap<&str, usize> = HashMap::new();
        for (idx, block) in self.blocks.iter().enumerate() {
            for member in &block.members {
                last_home.insert(member.as_str(), idx);
            }
        }

        let mut groups: Vec<Group> = Vec::new();
        for (idx, block) in self.blocks.iter().enumerate() {
            let pos = match groups.iter().position(|g| g.name == block.name) {
                Some(pos) => pos,
                None => {
                    groups.push(Group::new(block.name.clone()));
                    groups.len() - 1
                }
            };
            for member in &block.members {
                if last_home.get(member.as_str()) == Some(&idx) && !groups[pos].contains(member) {
                    groups[pos].members.push(member.clone());
                }
            }
        }
        groups
    }
}

/// Parse sink text.
///
/// A line ending in `:` opens a block and the line right after it is that
/// block's member line, split on `", "`, whatever it ends with. A blank
/// member line is an empty group. Lines before the first header are ignored.
pub fn parse_sink(text: &str) -> SinkContents {
    let mut blocks: Vec<Group> = Vec::new();
    let mut member_line_next = false;

    for line in text.lines() {
        let line = line.trim();

        if member_line_next {
            member_line_next = false;
            if let Some(block) = blocks.last_mut() {
                push_members(block, line);
            }
            continue;
        }

        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_suffix(':') {
            blocks.push(Group::new(name));
            member_line_next = true;
            continue;
        }

        // Member lines wrapped by hand still belong to the open block.
        if let Some(block) = blocks.last_mut() {
            push_members(block, line);
        }
    }

    SinkContents { blocks }
}

fn push_members(block: &mut Group, line: &str) {
    block.members.extend(
        line.split(MEMBER_SEPARATOR)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from),
    );
}

/// Read and parse a sink file.
pub fn read_sink(path: &Path) -> Result<SinkContents> {
    let text = std::fs::read_to_string(path).map_err(|e| LipidSortError::io(path, e))?;
    Ok(parse_sink(&text))
}
