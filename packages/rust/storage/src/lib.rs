//! Plain-file persistence for lipidsort.
//!
//! Everything the sorter reads or writes lives in human-editable text files:
//! - [`lists`]: one-item-per-line files (compound lists, formula lists)
//! - [`sink`]: the grouped result file (`GROUP:` / members / blank line)
//! - [`transcript`]: the prompt/reply audit log of a sort run
//!
//! All functions here are synchronous; files are small and the sorter never
//! has more than one writer.

pub mod lists;
pub mod sink;
pub mod transcript;

pub use lists::{load_compounds, load_sort_input, read_lines, write_lines};
pub use sink::{SinkContents, SortSink, parse_sink, read_sink, render_block};
pub use transcript::Transcript;

use std::path::Path;

use lipidsort_shared::{LipidSortError, Result};

/// Create the parent directory of `path` if it has one and it is missing.
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| LipidSortError::io(parent, e))?;
        }
    }
    Ok(())
}
