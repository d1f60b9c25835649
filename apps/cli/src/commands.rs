//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use lipidsort_core::{SortOptions, SortOutputs, SortProgress, SortReport, check_files, sort_compounds};
use lipidsort_lipidmaps::{LipidMapsClient, match_formulas};
use lipidsort_oracle::{ChatOracle, ChatOracleOptions};
use lipidsort_shared::{AppConfig, init_config, load_config, load_config_from, validate_api_key};
use lipidsort_storage::{load_sort_input, read_lines, write_lines};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// lipidsort: group mass-spectrometry compounds with a language model.
#[derive(Parser)]
#[command(
    name = "lipidsort",
    version,
    about = "Sort significant compounds into classification groups with a language-model oracle.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.lipidsort/lipidsort.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Sort a compound list into groups until every compound is placed.
    Sort {
        /// Compound list, one name per line.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Grouped output file.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Prompt/reply log.
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// `Compound => Group` file applied before the first oracle call.
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Repair passes allowed after the first pass.
        #[arg(long)]
        max_passes: Option<u32>,
    },

    /// Report input compounds missing from a grouped output file.
    Check {
        /// Compound list, one name per line.
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Grouped output file to check.
        #[arg(short, long)]
        sorted: Option<PathBuf>,
    },

    /// Look up molecular formulas for compound names in a CSV export.
    #[command(name = "match")]
    Match {
        /// Compound names, one per line.
        #[arg(long, default_value = "Unique.txt")]
        unique: PathBuf,

        /// CSV export with `Name` and `Formula` columns.
        #[arg(long)]
        compounds: PathBuf,

        /// Where to write the matched formulas.
        #[arg(long, default_value = "MatchedFormulas.txt")]
        out: PathBuf,
    },

    /// Classify formulas with LipidMaps and write the sorter's input list.
    Fetch {
        /// Formulas, one per line.
        #[arg(long, default_value = "MatchedFormulas.txt")]
        formulas: PathBuf,

        /// Annotated compound list (`formula: core, main class`).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Seed grouping (`formula => core`).
        #[arg(long, default_value = "preGroup.txt")]
        pregroup: PathBuf,

        /// Formulas LipidMaps had no data for.
        #[arg(long, default_value = "failedCompounds.txt")]
        failed: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "lipidsort=info",
        1 => "lipidsort=debug",
        _ => "lipidsort=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Sort {
            input,
            out,
            transcript,
            seed,
            max_passes,
        } => {
            let config = resolve_config(config_path)?;
            let args = SortArgs {
                input: input.unwrap_or_else(|| config.paths.input.clone()),
                out: out.unwrap_or_else(|| config.paths.sink.clone()),
                transcript: transcript.unwrap_or_else(|| config.paths.transcript.clone()),
                seed,
                max_passes: max_passes.unwrap_or(config.sorting.max_repair_passes),
            };
            cmd_sort(&config, args).await
        }
        Command::Check { input, sorted } => {
            let config = resolve_config(config_path)?;
            let input = input.unwrap_or_else(|| config.paths.input.clone());
            let sorted = sorted.unwrap_or_else(|| config.paths.sink.clone());
            cmd_check(&input, &sorted)
        }
        Command::Match {
            unique,
            compounds,
            out,
        } => cmd_match(&unique, &compounds, &out),
        Command::Fetch {
            formulas,
            out,
            pregroup,
            failed,
        } => {
            let config = resolve_config(config_path)?;
            let out = out.unwrap_or_else(|| config.paths.input.clone());
            cmd_fetch(&config, &formulas, &out, &pregroup, &failed).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

struct SortArgs {
    input: PathBuf,
    out: PathBuf,
    transcript: PathBuf,
    seed: Option<PathBuf>,
    max_passes: u32,
}

async fn cmd_sort(config: &AppConfig, args: SortArgs) -> Result<()> {
    // Fail on a missing key before touching any file.
    let api_key = validate_api_key(config)?;

    let compounds = load_sort_input(&args.input)?;

    let seed = match &args.seed {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .map_err(|e| eyre!("cannot read seed file '{}': {e}", path.display()))?,
        ),
        None => None,
    };

    let oracle = ChatOracle::new(ChatOracleOptions::from_config(&config.oracle, api_key)?)?;

    let options = SortOptions {
        max_repair_passes: args.max_passes as usize,
        seed,
        model_label: oracle.model().to_string(),
    };
    let outputs = SortOutputs {
        sink: args.out.clone(),
        transcript: args.transcript.clone(),
    };

    info!(
        input = %args.input.display(),
        compounds = compounds.len(),
        model = %options.model_label,
        "sorting compounds"
    );

    let reporter = CliProgress::new();
    let report = sort_compounds(&oracle, compounds, &options, &outputs, &reporter).await?;

    println!();
    println!("  Run:        {}", report.run_id);
    println!("  Groups:     {}", report.groups.len());
    println!("  Assigned:   {}", report.assigned);
    println!("  Moved:      {}", report.moved);
    println!("  Warnings:   {}", report.warnings);
    println!("  Calls:      {}", report.oracle_calls);
    println!("  Passes:     {}", report.passes);
    println!("  Output:     {}", args.out.display());
    println!("  Transcript: {}", args.transcript.display());
    println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    println!();

    if report.is_complete() {
        return Ok(());
    }

    println!("  Unresolved compounds:");
    for compound in &report.unresolved {
        println!("    {compound}");
    }
    println!();

    Err(eyre!(
        "{} compound(s) unresolved: {}",
        report.unresolved.len(),
        report.stop
    ))
}

fn cmd_check(input: &Path, sorted: &Path) -> Result<()> {
    let report = check_files(input, sorted)?;

    println!();
    for group in &report.groups {
        println!("  {} ({})", group.name, group.members.len());
        for member in &group.members {
            println!("    {member}");
        }
    }
    println!();

    if report.is_complete() {
        println!(
            "All {} compounds from {} are in {}.",
            report.input_keys,
            input.display(),
            sorted.display()
        );
        return Ok(());
    }

    println!("Compounds not found in {}:", sorted.display());
    for compound in &report.missing {
        println!("{compound}");
    }
    println!();
    println!("  Found:   {}/{}", report.found, report.input_keys);
    println!("  Missing: {}", report.missing.len());

    Ok(())
}

fn cmd_match(unique: &Path, compounds: &Path, out: &Path) -> Result<()> {
    let names = read_lines(unique)?;
    let matches = match_formulas(&names, compounds)?;
    write_lines(out, &matches.formulas)?;

    println!();
    println!("  Formulas:   {}", matches.formulas.len());
    println!("  Duplicates: {}", matches.duplicates.len());
    println!("  Unmatched:  {}", matches.unmatched.len());
    println!("  Output:     {}", out.display());
    for (formula, shared_by) in &matches.duplicates {
        println!("    {formula}: {}", shared_by.join(", "));
    }
    println!();

    Ok(())
}

async fn cmd_fetch(
    config: &AppConfig,
    formulas: &Path,
    out: &Path,
    pregroup: &Path,
    failed: &Path,
) -> Result<()> {
    let lines = read_lines(formulas)?;
    let client = LipidMapsClient::new(&config.lipidmaps)?;

    info!(formulas = lines.len(), "querying LipidMaps");
    let spinner = spinner();
    spinner.set_message(format!("Querying LipidMaps for {} formulas", lines.len()));
    let annotation = client.annotate(&lines).await;
    spinner.finish_and_clear();

    let input_lines: Vec<String> = annotation.records.iter().map(|r| r.input_line()).collect();
    let seed_lines: Vec<String> = annotation
        .records
        .iter()
        .map(|r| r.pregroup_line())
        .collect();

    write_lines(out, &input_lines)?;
    write_lines(pregroup, &seed_lines)?;
    write_lines(failed, &annotation.failed)?;

    println!();
    println!("  Annotated: {}", annotation.records.len());
    println!("  Failed:    {}", annotation.failed.len());
    println!("  Output:    {}", out.display());
    println!("  Seed:      {}", pregroup.display());
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Sort progress shown on an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self { spinner: spinner() }
    }
}

impl SortProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn batch(&self, call: usize, pending: usize) {
        self.spinner
            .set_message(format!("Oracle call {call}, {pending} compounds pending"));
    }

    fn done(&self, _report: &SortReport) {
        self.spinner.finish_and_clear();
    }
}
