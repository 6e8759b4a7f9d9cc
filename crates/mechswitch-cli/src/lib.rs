//! `mechswitch` command-line surface.
//!
//! The arguments and the pipeline live in the library so integration tests and
//! other front-ends can drive a run without spawning the binary.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mechswitch_engine::{reconcile, DuplicatePolicy, ReconcileOptions, Report};
use mechswitch_xlsx::{output_path_for, InventoryDocument};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Duplicates {
    /// Keep the later catalog row and warn.
    LastWins,
    /// Fail on the first repeated name.
    Reject,
}

impl From<Duplicates> for DuplicatePolicy {
    fn from(value: Duplicates) -> Self {
        match value {
            Duplicates::LastWins => DuplicatePolicy::LastWins,
            Duplicates::Reject => DuplicatePolicy::Reject,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "mechswitch",
    version,
    about = "Classify owned/missing switches and cross-link the Boards and Switches sheets of an inventory workbook."
)]
pub struct Args {
    /// Inventory workbook (.xlsx/.xlsm) containing "Switches" and "Boards" sheets.
    #[arg(env = "MECHSWITCH_INPUT")]
    pub input: PathBuf,

    /// Where to write the annotated workbook (default: `<stem>_new.<ext>` next to the input).
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Report format printed to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// How to treat a switch name that appears on more than one catalog row.
    #[arg(long, value_enum, default_value_t = Duplicates::LastWins)]
    pub duplicates: Duplicates,

    /// Run the whole pipeline and print the report, but write nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default `warn` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    run_with_args(&args).map(|_| ())
}

/// Execute one reconciliation. Returns the path written, if any.
pub fn run_with_args(args: &Args) -> Result<Option<PathBuf>> {
    let input = args.input.as_path();
    if !input.is_file() {
        anyhow::bail!("{} is not a file", input.display());
    }

    let options = ReconcileOptions {
        duplicates: args.duplicates.into(),
        ..ReconcileOptions::default()
    };

    let mut doc = InventoryDocument::open(input)
        .with_context(|| format!("read workbook {}", input.display()))?;
    let layout = &options.layout;
    doc.require_tables(&[layout.catalog_sheet.as_str(), layout.board_sheet.as_str()])
        .with_context(|| format!("locate tables in {}", input.display()))?;

    let outcome = reconcile(doc.workbook_mut(), &options)
        .with_context(|| format!("reconcile {}", input.display()))?;
    log::info!(
        "{} back-links, {} board links",
        outcome.back_links,
        outcome.board_links
    );

    let report = Report::from_registry(&outcome.registry);
    print_report(&report, args.format).context("write report")?;

    if args.dry_run {
        log::info!("dry run; nothing written");
        return Ok(None);
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| output_path_for(input));
    if same_file(input, &output) {
        anyhow::bail!(
            "refusing to overwrite the input workbook {}",
            input.display()
        );
    }
    doc.save_to(&output)
        .with_context(|| format!("write {}", output.display()))?;
    Ok(Some(output))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn print_report(report: &Report, format: OutputFormat) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let written = match format {
        OutputFormat::Text => write!(handle, "{report}"),
        OutputFormat::Json => serde_json::to_writer_pretty(&mut handle, report)
            .map_err(io::Error::from)
            .and_then(|()| handle.write_all(b"\n")),
    };
    match written {
        // A closed pipe (`mechswitch ... | head`) is not a failure.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other.map_err(anyhow::Error::from),
    }
}
