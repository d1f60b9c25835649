//! The sort run: batched oracle passes until the sink covers the input.
//!
//! An inner pass drains the pending queue ten compounds at a time and stops
//! early when a reply assigns nothing. After each pass the store is persisted
//! and the sink is read back; input compounds it does not cover are re-queued
//! for a repair pass. Repair passes stop when the sink is complete, when the
//! configured number of repairs is used up, or when a repair leaves at least
//! as many compounds missing as the pass before it.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use lipidsort_oracle::Oracle;
use lipidsort_shared::{Compound, Group, Result, RunId};
use lipidsort_storage::{SortSink, Transcript, read_sink};
use tracing::{debug, info, instrument, warn};

use crate::prompt::build_prompt;
use crate::reconcile::missing_compounds;
use crate::session::SessionState;

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct SortOptions {
    /// Repair passes allowed after the first pass.
    pub max_repair_passes: usize,
    /// `Compound => Group` lines applied before the first oracle call.
    pub seed: Option<String>,
    /// Model name written to the transcript header.
    pub model_label: String,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            max_repair_passes: 5,
            seed: None,
            model_label: String::from("unknown"),
        }
    }
}

/// Where a run writes.
#[derive(Debug, Clone)]
pub struct SortOutputs {
    /// Grouped result file.
    pub sink: PathBuf,
    /// Prompt/reply audit log.
    pub transcript: PathBuf,
}

/// Why the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every input compound is in the sink.
    Converged,
    /// The repair pass limit was reached.
    PassLimit,
    /// A repair pass did not reduce the number of missing compounds.
    NoProgress,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => f.write_str("converged"),
            Self::PassLimit => f.write_str("repair pass limit reached"),
            Self::NoProgress => f.write_str("repair pass made no progress"),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct SortReport {
    pub run_id: RunId,
    /// Final groups, creation order.
    pub groups: Vec<Group>,
    /// Passes run, the first included.
    pub passes: usize,
    pub oracle_calls: usize,
    pub assigned: usize,
    pub moved: usize,
    pub warnings: usize,
    /// Input compounds still absent from the sink.
    pub unresolved: Vec<Compound>,
    pub stop: StopReason,
    pub elapsed: Duration,
}

impl SortReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Progress callback for reporting run status.
pub trait SortProgress: Send + Sync {
    /// Called when a pass starts.
    fn phase(&self, name: &str);
    /// Called before each oracle call.
    fn batch(&self, call: usize, pending: usize);
    /// Called once the run has stopped.
    fn done(&self, report: &SortReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl SortProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn batch(&self, _call: usize, _pending: usize) {}
    fn done(&self, _report: &SortReport) {}
}

#[derive(Debug, Default, Clone, Copy)]
struct PassStats {
    calls: usize,
    assigned: usize,
    moved: usize,
    warnings: usize,
}

/// Sort `compounds` into groups with `oracle`.
///
/// Oracle and I/O failures abort the run. Everything the oracle says, however
/// unusable, is absorbed as warnings.
#[instrument(skip_all, fields(compounds = compounds.len()))]
pub async fn sort_compounds<O: Oracle>(
    oracle: &O,
    compounds: Vec<Compound>,
    options: &SortOptions,
    outputs: &SortOutputs,
    progress: &dyn SortProgress,
) -> Result<SortReport> {
    let start = Instant::now();
    let run_id = RunId::new();
    info!(%run_id, sink = %outputs.sink.display(), "starting sort run");

    let mut transcript = Transcript::create(&outputs.transcript, &run_id, &options.model_label)?;
    let mut sink = SortSink::new(&outputs.sink);
    let mut session = SessionState::new(compounds.clone());
    let mut totals = PassStats::default();

    if let Some(seed) = &options.seed {
        let outcome = session.apply_reply(seed);
        session.refresh_pending();
        info!(
            assigned = outcome.assigned,
            warnings = outcome.warnings.len(),
            "applied seed groups"
        );
    }

    let mut passes = 0;
    let mut previous_missing: Option<usize> = None;

    let (stop, unresolved) = loop {
        passes += 1;
        progress.phase(if passes == 1 {
            "Sorting compounds"
        } else {
            "Repairing unresolved compounds"
        });

        let stats = run_pass(oracle, &mut session, &mut transcript, progress).await?;
        totals.calls += stats.calls;
        totals.assigned += stats.assigned;
        totals.moved += stats.moved;
        totals.warnings += stats.warnings;

        sink.persist(session.store().groups())?;
        let missing = missing_compounds(&compounds, &read_sink(sink.path())?);

        if missing.is_empty() {
            break (StopReason::Converged, missing);
        }
        if passes > options.max_repair_passes {
            break (StopReason::PassLimit, missing);
        }
        if previous_missing.is_some_and(|prev| missing.len() >= prev) {
            break (StopReason::NoProgress, missing);
        }

        warn!(pass = passes, missing = missing.len(), "re-queueing compounds missing from sink");
        previous_missing = Some(missing.len());
        for compound in &missing {
            sink.forget(&compound.raw);
        }
        session.reseed(&missing);
    };

    let report = SortReport {
        run_id,
        groups: session.store().groups().to_vec(),
        passes,
        oracle_calls: totals.calls,
        assigned: totals.assigned,
        moved: totals.moved,
        warnings: totals.warnings,
        unresolved,
        stop,
        elapsed: start.elapsed(),
    };

    if report.is_complete() {
        info!(
            groups = report.groups.len(),
            calls = report.oracle_calls,
            passes = report.passes,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "sort run complete"
        );
    } else {
        warn!(
            unresolved = report.unresolved.len(),
            reason = %report.stop,
            "sort run stopped with unresolved compounds"
        );
    }

    progress.done(&report);
    Ok(report)
}

/// One inner pass over the pending queue.
async fn run_pass<O: Oracle>(
    oracle: &O,
    session: &mut SessionState,
    transcript: &mut Transcript,
    progress: &dyn SortProgress,
) -> Result<PassStats> {
    let mut stats = PassStats::default();

    loop {
        let batch = session.next_batch();
        if batch.is_empty() {
            break;
        }

        let prompt = build_prompt(session.store().groups(), &batch);
        progress.batch(stats.calls + 1, session.pending().len());

        let reply = oracle.ask(&prompt).await?;
        transcript.record(&prompt, &reply)?;
        stats.calls += 1;
        debug!(batch = batch.len(), reply_len = reply.len(), "oracle replied");

        let outcome = session.apply_reply(&reply);
        session.refresh_pending();
        stats.assigned += outcome.assigned;
        stats.moved += outcome.moved;
        stats.warnings += outcome.warnings.len();

        if outcome.assigned == 0 {
            warn!(
                batch = batch.len(),
                pending = session.pending().len(),
                "reply assigned nothing; ending pass"
            );
            break;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use lipidsort_shared::LipidSortError;

    use super::*;

    /// Replies from a script, then empty strings.
    struct ScriptedOracle {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedOracle {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl Oracle for ScriptedOracle {
        async fn ask(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.replies.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    /// Assigns every compound in the prompt's batch to one group.
    struct EchoOracle {
        calls: Mutex<usize>,
    }

    impl Oracle for EchoOracle {
        async fn ask(&self, prompt: &str) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            let batch = prompt
                .split("Group these compounds for now:\n")
                .nth(1)
                .unwrap_or_default();
            Ok(batch
                .lines()
                .filter_map(|l| l.strip_prefix("- "))
                .map(|name| format!("{name} => Bucket"))
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }

    struct FailingOracle;

    impl Oracle for FailingOracle {
        async fn ask(&self, _prompt: &str) -> Result<String> {
            Err(LipidSortError::oracle("HTTP 500"))
        }
    }

    fn outputs(dir: &tempfile::TempDir) -> SortOutputs {
        SortOutputs {
            sink: dir.path().join("PostGPT.txt"),
            transcript: dir.path().join("logs").join("final_conversation.log"),
        }
    }

    fn compounds(names: &[&str]) -> Vec<Compound> {
        names.iter().map(|n| Compound::new(*n)).collect()
    }

    #[tokio::test]
    async fn well_formed_replies_take_ceil_n_over_ten_calls() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (1..=23).map(|i| format!("Compound {i}")).collect();
        let input: Vec<Compound> = names.iter().map(Compound::new).collect();
        let oracle = EchoOracle {
            calls: Mutex::new(0),
        };

        let report = sort_compounds(
            &oracle,
            input,
            &SortOptions::default(),
            &outputs(&dir),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(*oracle.calls.lock().unwrap(), 3);
        assert_eq!(report.oracle_calls, 3);
        assert_eq!(report.passes, 1);
        assert_eq!(report.assigned, 23);
        assert_eq!(report.stop, StopReason::Converged);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].members.len(), 23);
    }

    #[tokio::test]
    async fn two_compounds_sorted_in_one_call() {
        let dir = tempfile::tempdir().unwrap();
        let out = outputs(&dir);
        let oracle = ScriptedOracle::new(&["Oleic Acid => Fatty Acids\nCholesterol => Sterols"]);

        let report = sort_compounds(
            &oracle,
            compounds(&["Oleic Acid", "Cholesterol"]),
            &SortOptions::default(),
            &out,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.oracle_calls, 1);
        assert_eq!(
            std::fs::read_to_string(&out.sink).unwrap(),
            "Fatty Acids:\nOleic Acid\n\nSterols:\nCholesterol\n\n"
        );

        let transcript = std::fs::read_to_string(&out.transcript).unwrap();
        assert!(transcript.contains("Prompt:\nHere are the compounds already sorted"));
        assert!(transcript.contains("Oracle Output:\nOleic Acid => Fatty Acids"));
    }

    #[tokio::test]
    async fn omitted_compound_gets_a_repair_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let out = outputs(&dir);
        let oracle = ScriptedOracle::new(&[
            "Oleic Acid => Fatty Acids",
            "I am not sure about the rest.",
            "Cholesterol => Sterols",
        ]);

        let report = sort_compounds(
            &oracle,
            compounds(&["Oleic Acid", "Cholesterol"]),
            &SortOptions::default(),
            &out,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.stop, StopReason::Converged);
        assert_eq!(report.passes, 2);
        assert_eq!(report.oracle_calls, 3);

        let prompts = oracle.prompts();
        assert!(prompts[2].contains("### Fatty Acids:\n- Oleic Acid\n"));
        assert!(prompts[2].ends_with("Group these compounds for now:\n- Cholesterol"));

        // The repair pass appends instead of rewriting.
        assert_eq!(
            std::fs::read_to_string(&out.sink).unwrap(),
            "Fatty Acids:\nOleic Acid\n\nSterols:\nCholesterol\n\n"
        );
    }

    #[tokio::test]
    async fn silent_oracle_stops_without_progress() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = ScriptedOracle::new(&[]);

        let report = sort_compounds(
            &oracle,
            compounds(&["Oleic Acid", "Cholesterol"]),
            &SortOptions::default(),
            &outputs(&dir),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.stop, StopReason::NoProgress);
        assert_eq!(report.passes, 2);
        assert_eq!(report.oracle_calls, 2);
        assert_eq!(report.unresolved, compounds(&["Oleic Acid", "Cholesterol"]));
    }

    #[tokio::test]
    async fn repair_limit_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = ScriptedOracle::new(&["Oleic Acid => Fatty Acids"]);
        let options = SortOptions {
            max_repair_passes: 0,
            ..SortOptions::default()
        };

        let report = sort_compounds(
            &oracle,
            compounds(&["Oleic Acid", "Cholesterol"]),
            &options,
            &outputs(&dir),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.stop, StopReason::PassLimit);
        assert_eq!(report.passes, 1);
        // Second call in the same pass got an empty reply and stalled.
        assert_eq!(report.oracle_calls, 2);
        assert_eq!(report.unresolved, compounds(&["Cholesterol"]));
    }

    #[tokio::test]
    async fn seed_groups_are_applied_before_first_call() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = ScriptedOracle::new(&["Cholesterol => Sterols"]);
        let options = SortOptions {
            seed: Some("Oleic Acid => Fatty Acids\n".into()),
            ..SortOptions::default()
        };

        let report = sort_compounds(
            &oracle,
            compounds(&["Oleic Acid", "Cholesterol"]),
            &options,
            &outputs(&dir),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert!(report.is_complete());
        let prompts = oracle.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("### Fatty Acids:\n- Oleic Acid\n"));
        assert!(prompts[0].ends_with("for now:\n- Cholesterol"));
    }

    #[tokio::test]
    async fn move_only_reply_ends_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let out = outputs(&dir);
        let oracle = ScriptedOracle::new(&[
            "move Cholesterol from Lipids to Sterols",
            "Oleic Acid => Fatty Acids",
        ]);
        let options = SortOptions {
            max_repair_passes: 0,
            seed: Some("Cholesterol => Lipids\n".into()),
            ..SortOptions::default()
        };

        let report = sort_compounds(
            &oracle,
            compounds(&["Cholesterol", "Oleic Acid"]),
            &options,
            &out,
            &SilentProgress,
        )
        .await
        .unwrap();

        // The move changed the store but assigned nothing, so the pass
        // stopped before asking about Oleic Acid again.
        assert_eq!(report.oracle_calls, 1);
        assert_eq!(report.moved, 1);
        assert_eq!(report.assigned, 0);
        assert_eq!(report.stop, StopReason::PassLimit);
        assert_eq!(report.unresolved, compounds(&["Oleic Acid"]));

        let sink = std::fs::read_to_string(&out.sink).unwrap();
        assert_eq!(sink, "Lipids:\n\n\nSterols:\nCholesterol\n\n");
        let groups = lipidsort_storage::parse_sink(&sink).merged_groups();
        assert_eq!(groups[1].members, vec!["Cholesterol"]);
    }

    #[tokio::test]
    async fn compound_name_ending_in_colon_converges() {
        let dir = tempfile::tempdir().unwrap();
        let out = outputs(&dir);
        let oracle = ScriptedOracle::new(&["Retinol => Vitamins", "Retinol => Vitamins"]);

        let report = sort_compounds(
            &oracle,
            compounds(&["Retinol:"]),
            &SortOptions::default(),
            &out,
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(report.stop, StopReason::Converged);
        assert_eq!(report.passes, 1);
        assert_eq!(report.oracle_calls, 1);
        assert!(report.unresolved.is_empty());
        assert_eq!(
            std::fs::read_to_string(&out.sink).unwrap(),
            "Vitamins:\nRetinol:\n\n"
        );
    }

    #[tokio::test]
    async fn empty_input_converges_without_calls() {
        let dir = tempfile::tempdir().unwrap();
        let out = outputs(&dir);
        let oracle = ScriptedOracle::new(&[]);

        let report = sort_compounds(&oracle, Vec::new(), &SortOptions::default(), &out, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report.stop, StopReason::Converged);
        assert_eq!(report.oracle_calls, 0);
        assert_eq!(std::fs::read_to_string(&out.sink).unwrap(), "");
    }

    #[tokio::test]
    async fn oracle_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let err = sort_compounds(
            &FailingOracle,
            compounds(&["Oleic Acid"]),
            &SortOptions::default(),
            &outputs(&dir),
            &SilentProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, LipidSortError::Oracle(_)));
    }
}
