use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "commitpulse")]
#[command(about = "Allocate commit batches across repositories and track the activity they produce")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Path to the statistics file", default_value = crate::store::DEFAULT_STATS_FILE)]
    pub stats: PathBuf,

    #[arg(short, long, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(long, help = "Write logs to this file instead of stderr")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one commit batch over the given repositories
    Run {
        #[arg(required = true, help = "Candidate repositories")]
        repos: Vec<PathBuf>,

        #[arg(long, help = "Distribute exactly this many commits")]
        total: Option<u32>,

        #[arg(long, help = "Number of repositories to select")]
        subset: Option<usize>,

        #[arg(long, help = "Roll the batch back after it completes")]
        discard: bool,

        #[arg(long, help = "Seed for reproducible allocation")]
        seed: Option<u64>,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Summarize recorded activity
    Report {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Compute the complexity score of a file
    Score {
        #[arg(help = "Repository the file belongs to")]
        repo: PathBuf,

        #[arg(help = "File path relative to the repository")]
        file: String,

        #[arg(long, help = "Store the score in the statistics file")]
        save: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        init_logging(&self.common)?;
        match self.command {
            Commands::Run { repos, total, subset, discard, seed, json } => {
                let options = crate::run::RunOptions { repos, total, subset, discard, seed, json };
                crate::run::exec(self.common, options)
            }
            Commands::Report { json } => crate::run::show_report(self.common, json),
            Commands::Score { repo, file, save } => crate::run::score(self.common, repo, file, save),
        }
    }
}

fn init_logging(common: &CommonArgs) -> Result<()> {
    let level = if common.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    match &common.log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
