//! vlurp - fetch GitHub repositories and gists, filtered by glob patterns
//!
//! Usage:
//!   vlurp <user>/<repo>                    Fetch to ./<user>/<repo>
//!   vlurp <user>/<repo> -d <root>          Fetch to <root>/<user>/<repo>
//!   vlurp <url>                            Fetch a GitHub/gist URL
//!   vlurp user/repo -f "src/**" -f "*.md"  Keep only matching files

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use dialoguer::Confirm;
use indicatif::ProgressBar;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vlurp::progress::{spinner, spinner_progress_fn};
use vlurp::{render_tree, Api, Error, FetchConfig, FilterSpec};

#[derive(Parser)]
#[command(name = "vlurp", version)]
#[command(about = "Fetch GitHub repositories and gists, filtered by glob patterns", long_about = None)]
struct Cli {
    /// `user/repo`, a GitHub repository URL, or a gist URL
    source: String,

    /// Root directory to fetch into; the target is <root>/<user>/<repo>
    #[arg(short = 'd', long = "root", value_name = "DIR")]
    root: Option<PathBuf>,

    /// Glob pattern to keep, or `!pattern` to drop (repeatable; defaults to .claude/** and CLAUDE.md)
    #[arg(short = 'f', long = "filter", value_name = "GLOB")]
    filters: Vec<String>,

    /// Keep every file instead of applying the default filters
    #[arg(long, conflicts_with = "filters")]
    all: bool,

    /// Replace the target directory without asking if it already exists
    #[arg(long)]
    force: bool,

    /// Print the outcome as JSON instead of a tree
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn filter_spec(&self) -> FilterSpec {
        if self.all {
            FilterSpec::new(Vec::<String>::new())
        } else if self.filters.is_empty() {
            FilterSpec::default()
        } else {
            FilterSpec::new(self.filters.iter().cloned())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vlurp=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("✗ Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = FetchConfig {
        root_dir: cli.root.clone(),
        filters: cli.filter_spec(),
        force_overwrite: cli.force,
        scratch_dir: None,
    };
    let filter_count = config.filters.len();

    let mut source = Api::from_config(config).source(&cli.source)?;
    let (owner, name) = (
        source.descriptor().owner().to_owned(),
        source.descriptor().name().to_owned(),
    );
    let target = source.target_path()?;

    let state = source.check_target()?;
    if state.is_collision() && !cli.force {
        if !confirm_overwrite(&target, state.entries())? {
            return Err(Error::TargetCollision {
                path: target,
                entries: state.entries(),
            }
            .into());
        }
        source = source.force_overwrite(true);
    }

    let label = format!("vlurping {owner}/{name}");
    let bar = if cli.json {
        ProgressBar::hidden()
    } else {
        spinner(format!("{label}..."))
    };
    let result = source
        .set_progress(spinner_progress_fn(bar.clone(), label))
        .fetch()
        .await;
    bar.finish_and_clear();
    let outcome = result?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("✓ Successfully vlurped {owner}/{name}");
    println!("  Location: {}", outcome.target.display());
    if filter_count > 0 {
        println!("  Filters: {filter_count} pattern(s) applied");
    }
    if let Some(tree) = render_tree(&outcome.target) {
        println!("\n{tree}");
    }
    println!(
        "✨ vlurped {} files to {}",
        outcome.file_count,
        outcome.target.display()
    );
    Ok(())
}

/// Ask before replacing an existing directory. Non-interactive sessions never overwrite.
fn confirm_overwrite(target: &Path, entries: usize) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Ok(false);
    }
    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Directory {} already exists with {entries} entries. Overwrite it?",
            target.display()
        ))
        .default(false)
        .interact()?;
    Ok(confirmed)
}
