//! Input vs. sink coverage check.

use std::collections::HashSet;
use std::path::Path;

use lipidsort_shared::{Compound, Group, NormalizationKey, Result, normalize};
use lipidsort_storage::{SinkContents, load_compounds, read_sink};
use tracing::info;

/// Outcome of comparing an input list with a sink file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// Distinct keys in the input.
    pub input_keys: usize,
    /// Distinct input keys present in the sink.
    pub found: usize,
    /// One compound per missing key, first listed raw name, input order.
    pub missing: Vec<Compound>,
    /// Final groups of the sink, each member under its last block.
    pub groups: Vec<Group>,
}

impl CheckReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Input compounds whose key appears nowhere in the sink.
pub fn missing_compounds(input: &[Compound], sink: &SinkContents) -> Vec<Compound> {
    let present: HashSet<NormalizationKey> = sink.members().map(normalize).collect();

    let mut reported: HashSet<&NormalizationKey> = HashSet::new();
    input
        .iter()
        .filter(|c| !present.contains(&c.key) && reported.insert(&c.key))
        .cloned()
        .collect()
}

/// Compare `input` with an already parsed sink.
pub fn check(input: &[Compound], sink: &SinkContents) -> CheckReport {
    let keys: HashSet<&NormalizationKey> = input.iter().map(|c| &c.key).collect();
    let missing = missing_compounds(input, sink);
    CheckReport {
        input_keys: keys.len(),
        found: keys.len() - missing.len(),
        missing,
        groups: sink.merged_groups(),
    }
}

/// Load both files and compare them.
pub fn check_files(input_path: &Path, sink_path: &Path) -> Result<CheckReport> {
    let input = load_compounds(input_path)?;
    let sink = read_sink(sink_path)?;
    let report = check(&input, &sink);
    info!(
        input = report.input_keys,
        found = report.found,
        missing = report.missing.len(),
        groups = report.groups.len(),
        "reconciliation check"
    );
    Ok(report)
}
