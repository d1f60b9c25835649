//! lipidsort CLI: sort mass-spectrometry compound lists into classification
//! groups with a language-model oracle.
//!
//! Also prepares the input (CSV formula matching, LipidMaps annotation) and
//! checks a finished sort against its input.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
