use std::fmt::Display;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use compaudit::reporter::{self, FileReport};
use compaudit::{ComponentKind, Dimension, EngineConfig};

mod audit;
mod compare;
mod migrate;
mod score;
mod validate;

#[derive(Parser)]
#[command(
    name = "compaudit",
    version,
    about = "Validate, score, and migrate agent, skill, command, and hook components"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Show project information
    #[arg(long)]
    about: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Engine configuration file [default: ./compaudit.toml when present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum Format {
    /// Human-readable text on stderr (default)
    #[default]
    Text,
    /// Pretty JSON on stdout
    Json,
}

/// Component kind, when it cannot be inferred from the path.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Agent,
    Skill,
    Command,
    Hook,
}

impl From<Kind> for ComponentKind {
    fn from(k: Kind) -> Self {
        match k {
            Kind::Agent => ComponentKind::Agent,
            Kind::Skill => ComponentKind::Skill,
            Kind::Command => ComponentKind::Command,
            Kind::Hook => ComponentKind::Hook,
        }
    }
}

/// Scoring dimension.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum DimensionArg {
    SchemaCompliance,
    Security,
    ContentQuality,
    Maintainability,
}

impl From<DimensionArg> for Dimension {
    fn from(d: DimensionArg) -> Self {
        match d {
            DimensionArg::SchemaCompliance => Dimension::SchemaCompliance,
            DimensionArg::Security => Dimension::Security,
            DimensionArg::ContentQuality => Dimension::ContentQuality,
            DimensionArg::Maintainability => Dimension::Maintainability,
        }
    }
}

#[derive(Subcommand)]
#[command(next_display_order = None)]
enum Commands {
    /// Validate component files (directories are searched for components)
    Validate {
        /// Component files or directories [default: .]
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,
        /// Component kind [default: inferred from each path]
        #[arg(long, value_enum)]
        kind: Option<Kind>,
        /// Also score each file and list recommendations
        #[arg(long)]
        deep: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Score a component on four quality dimensions
    Score {
        /// Component file
        path: PathBuf,
        /// Component kind [default: inferred from the path]
        #[arg(long, value_enum)]
        kind: Option<Kind>,
        /// Score a single dimension
        #[arg(long, value_enum)]
        dimension: Option<DimensionArg>,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Plan or apply a migration to the current schema
    Migrate {
        /// Component file
        path: PathBuf,
        /// Component kind [default: inferred from the path]
        #[arg(long, value_enum)]
        kind: Option<Kind>,
        /// Write the migrated file (a timestamped backup is kept)
        #[arg(long, conflicts_with = "dry_run")]
        apply: bool,
        /// Preview the migration as a diff (default)
        #[arg(long)]
        dry_run: bool,
        /// Approve a confirmation-gated change by id (repeatable)
        #[arg(long = "approve", value_name = "ID")]
        approve: Vec<String>,
        /// Approve every confirmation-gated change
        #[arg(long, short = 'y')]
        yes: bool,
        /// Also list remaining diagnostics after migration
        #[arg(long)]
        deep: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Compare two components side by side
    Compare {
        /// First component file
        left: PathBuf,
        /// Second component file
        right: PathBuf,
        /// Component kind of both files [default: inferred from each path]
        #[arg(long, value_enum)]
        kind: Option<Kind>,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// Discover and validate every component under a directory
    Audit {
        /// Project or plugin directory [default: .]
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Also score each file and list recommendations
        #[arg(long)]
        deep: bool,
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

pub fn run(cli: Cli) {
    init_tracing(cli.verbose);

    if cli.about {
        print_about();
        return;
    }

    let Some(command) = cli.command else {
        eprintln!("Usage: compaudit <command> [args]");
        eprintln!("Run `compaudit --help` for details.");
        std::process::exit(1);
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = EngineConfig::load(cli.config.as_deref(), &cwd).unwrap_or_else(|e| fail("", e));

    match command {
        Commands::Validate {
            paths,
            kind,
            deep,
            format,
        } => validate::run(paths, kind, deep, format, config),
        Commands::Score {
            path,
            kind,
            dimension,
            format,
        } => score::run(path, kind, dimension, format, config),
        Commands::Migrate {
            path,
            kind,
            apply,
            dry_run: _,
            approve,
            yes,
            deep,
            format,
        } => migrate::run(
            migrate::Args {
                path,
                kind,
                apply,
                approve,
                yes,
                deep,
                format,
            },
            config,
        ),
        Commands::Compare {
            left,
            right,
            kind,
            format,
        } => compare::run(&left, &right, kind, format, &config),
        Commands::Audit { dir, deep, format } => audit::run(dir, deep, format, config),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .ok();
}

fn print_about() {
    println!(
        "compaudit: component validation, scoring, and migration\n\
         ├─ version:    {}\n\
         ├─ author:     {}\n\
         ├─ source:     {}\n\
         └─ licence:    {} https://www.apache.org/licenses/LICENSE-2.0",
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_AUTHORS"),
        env!("CARGO_PKG_REPOSITORY"),
        env!("CARGO_PKG_LICENSE"),
    );
}

/// Print `compaudit <cmd>: <error>` and exit 1.
fn fail(cmd: &str, err: impl Display) -> ! {
    if cmd.is_empty() {
        eprintln!("compaudit: {err}");
    } else {
        eprintln!("compaudit {cmd}: {err}");
    }
    std::process::exit(1);
}

/// Exit with `code` unless it is zero.
fn exit_with(code: i32) {
    if code != 0 {
        std::process::exit(code);
    }
}

/// Print a multi-file report in the requested format.
fn emit_reports(cmd: &str, reports: &[FileReport], format: Format) {
    match format {
        Format::Text => eprint!("{}", reporter::render_text(reports)),
        Format::Json => {
            let json = reporter::render_json(reports).unwrap_or_else(|e| fail(cmd, e));
            println!("{json}");
        }
    }
}

/// Expand directories into the component files they contain.
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .flat_map(|p| {
            if p.is_dir() {
                compaudit::discover(p)
            } else {
                vec![p.clone()]
            }
        })
        .collect()
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
