//! Classification reconciliation engine for lipidsort.
//!
//! Compounds are sent to an [`Oracle`](lipidsort_oracle::Oracle) in batches,
//! its replies are parsed into group mutations, and passes repeat until the
//! persisted groups cover every input compound (see [`controller`]).

pub mod controller;
pub mod parser;
pub mod prompt;
pub mod reconcile;
pub mod session;
pub mod store;

pub use controller::{
    SilentProgress, SortOptions, SortOutputs, SortProgress, SortReport, StopReason, sort_compounds,
};
pub use parser::{MutationCommand, ParsedReply, Warning, parse_reply};
pub use prompt::build_prompt;
pub use reconcile::{CheckReport, check, check_files, missing_compounds};
pub use session::{BATCH_SIZE, SessionState};
pub use store::GroupStore;
