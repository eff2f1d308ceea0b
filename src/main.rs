use anyhow::{Context, Result};
use backend_patcher::config::{load_from_path, PatchConfig};
use backend_patcher::{PatchOptions, Patcher, WorkspaceGuard};
use clap::Parser;
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "backend-patcher")]
#[command(about = "Insert generated methods after matched declarations", long_about = None)]
#[command(version)]
struct Cli {
    /// Target file (default: src/strategy/atomic_execution.rs)
    #[arg(conflicts_with = "rules")]
    file: Option<PathBuf>,

    /// Rule file to apply instead of the built-in quantity-step rule
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Workspace root that targets must live under (default: current directory)
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Dry run - show what would be inserted without modifying files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show unified diff of changes
    #[arg(short, long)]
    diff: bool,

    /// Skip matches whose impl block already has the inserted method
    #[arg(long)]
    skip_existing: bool,

    /// Fail without writing unless exactly this many insertions are made
    #[arg(long, value_name = "N")]
    expect: Option<usize>,

    /// Refuse to write output that no longer parses as Rust
    #[arg(long)]
    check_syntax: bool,

    /// Log each match to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let workspace = match &cli.workspace {
        Some(path) => path.clone(),
        None => env::current_dir().context("cannot determine current directory")?,
    };
    let guard = WorkspaceGuard::new(&workspace)?;

    let config = match &cli.rules {
        Some(path) => load_from_path(path)?,
        None => PatchConfig::builtin(),
    };

    for definition in &config.rules {
        let target = match &cli.file {
            Some(file) => file.clone(),
            None => config.resolve_target(definition, guard.root()),
        };
        let target = guard.validate_path(&target)?;

        let options = PatchOptions {
            skip_existing: cli.skip_existing,
            expect: cli.expect.or(definition.expect),
            check_syntax: cli.check_syntax,
        };
        let patcher = Patcher::new(&target, definition.to_rule()?).with_options(options);

        let plan = patcher
            .plan()
            .with_context(|| format!("rule '{}' failed", definition.id))?;
        let inserted = plan.transform.inserted();

        if plan.transform.matches.is_empty() {
            eprintln!(
                "{}",
                format!("Warning: pattern matched no locations in {}", target.display()).yellow()
            );
        }

        if cli.diff && !plan.is_unchanged() {
            display_diff(&target, &plan.original, &plan.transform.content);
        }

        if cli.dry_run {
            eprintln!(
                "{}",
                format!(
                    "{}: {} matched, {} would be inserted, {} skipped",
                    target.display(),
                    plan.transform.matches.len(),
                    inserted,
                    plan.transform.skipped()
                )
                .dimmed()
            );
            println!(
                "{} {}: would insert {} into {}",
                "⊙".cyan(),
                definition.id,
                inserted,
                target.display()
            );
            continue;
        }

        let report = patcher
            .commit(plan)
            .with_context(|| format!("rule '{}' failed", definition.id))?;

        eprintln!("{}", report.to_string().dimmed());
        println!("{}", definition.message());
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "backend_patcher=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Show unified diff between original and patched content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}
