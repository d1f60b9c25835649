//! One-item-per-line text files.

use std::path::Path;

use lipidsort_shared::{Compound, LipidSortError, Result};
use tracing::debug;

use crate::ensure_parent;

/// Read every non-blank line of `path`, trimmed.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| LipidSortError::io(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Load a compound list: one raw name per non-blank line, in file order.
pub fn load_compounds(path: &Path) -> Result<Vec<Compound>> {
    let compounds: Vec<Compound> = read_lines(path)?.into_iter().map(Compound::new).collect();
    debug!(path = %path.display(), count = compounds.len(), "loaded compound list");
    Ok(compounds)
}

/// Load the compound list a sort run works on. An empty list is a
/// validation error: there is nothing to sort.
pub fn load_sort_input(path: &Path) -> Result<Vec<Compound>> {
    let compounds = load_compounds(path)?;
    if compounds.is_empty() {
        return Err(LipidSortError::validation(format!(
            "no compounds found in {}",
            path.display()
        )));
    }
    Ok(compounds)
}

/// Write `lines` to `path`, one per line, replacing any existing file.
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    ensure_parent(path)?;

    let mut content = String::new();
    for line in lines {
        content.push_str(line.as_ref());
        content.push('\n');
    }

    std::fs::write(path, content).map_err(|e| LipidSortError::io(path, e))
}
