mod render;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use changeview_core::api::{self, FlatSource};
use changeview_core::cache::CacheRegistry;
use changeview_core::config::ModelConfig;
use changeview_core::merge_strategy::{StrategyRegistry, resolve_all};
use changeview_core::store::{GitObjectStore, ObjectStore};
use changeview_core::three_way::ThreeWayDiff;
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

#[derive(Parser)]
#[command(
    name = "changeview",
    about = "Show what changed between commits, the index and the working tree"
)]
struct Cli {
    /// Path inside the repository
    #[arg(short, long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Config file; defaults to .git/info/changeview/config.json when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// More logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Command {
    /// Commits on both sides of FROM...TO with their changes as folder trees
    History { from: String, to: String },
    /// Every file changed between FROM and TO, newest change per path
    Range { from: String, to: String },
    /// Index compared with HEAD
    Staged,
    /// Working tree compared with the index
    Worktree,
    /// LOCAL and REMOTE compared against BASE
    ThreeWay {
        base: String,
        local: String,
        remote: String,
        /// Merge strategy used to pick a side per path; defaults to the configured one
        #[arg(short, long)]
        strategy: Option<String>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
}

fn load_config(cli: &Cli, store: &dyn ObjectStore) -> Result<ModelConfig> {
    match &cli.config {
        Some(path) => ModelConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => ModelConfig::discover(store).context("failed to read repository config"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let stdout = std::io::stdout();
    run(&cli, &mut stdout.lock())
}

fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    let store = GitObjectStore::discover(&cli.repo)
        .with_context(|| format!("no repository at {}", cli.repo.display()))?;
    let config = load_config(cli, &store)?;
    log::info!("using repository {}", store.identity());

    let abbrev = config.abbreviation_length;
    let strategy_name = config.merge_strategy.clone();
    let registry = CacheRegistry::new(config);

    match &cli.command {
        Command::History { from, to } => {
            let commits = api::build_history_range(&registry, &store, from, to)
                .with_context(|| format!("failed to build history {from}...{to}"))?;
            match cli.format {
                Format::Json => print_json(out, &*commits)?,
                Format::Text => write!(out, "{}", render::history(&commits, abbrev))?,
            }
        }
        Command::Range { from, to } => {
            let source = FlatSource::Range {
                from: from.clone(),
                to: to.clone(),
            };
            let changes = api::build_flat_changes(&registry, &store, source)
                .with_context(|| format!("failed to collect changes in {from}...{to}"))?;
            match cli.format {
                Format::Json => print_json(out, &*changes)?,
                Format::Text => write!(out, "{}", render::changes(changes.values(), abbrev))?,
            }
        }
        Command::Staged | Command::Worktree => {
            let source = if matches!(cli.command, Command::Staged) {
                FlatSource::Staged
            } else {
                FlatSource::WorkingTree
            };
            let changes = api::build_flat_changes(&registry, &store, source)
                .context("failed to collect local changes")?;
            match cli.format {
                Format::Json => print_json(out, &*changes)?,
                Format::Text => write!(out, "{}", render::changes(changes.values(), abbrev))?,
            }
        }
        Command::ThreeWay {
            base,
            local,
            remote,
            strategy,
        } => {
            let resolve = |rev: &str| {
                store
                    .resolve(rev)
                    .with_context(|| format!("cannot resolve {rev}"))
            };
            let diff = ThreeWayDiff::run(
                &store,
                Some(resolve(base)?),
                resolve(local)?,
                resolve(remote)?,
            )
            .context("three-way comparison failed")?;

            let name = strategy.as_deref().unwrap_or(&strategy_name);
            let strategies = StrategyRegistry::with_defaults();
            let picked = resolve_all(strategies.get(name)?, &diff);

            match cli.format {
                Format::Json => {
                    let resolutions: BTreeMap<_, _> = picked.iter().cloned().collect();
                    let value = serde_json::json!({
                        "strategy": name,
                        "changes": diff.entries(),
                        "resolutions": resolutions,
                    });
                    print_json(out, &value)?;
                }
                Format::Text => {
                    let text = render::three_way(diff.entries(), &picked, abbrev);
                    write!(out, "{text}")?;
                }
            }
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    writeln!(out, "{json}")?;
    Ok(())
}
