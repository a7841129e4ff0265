//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;
use verity_domain::OutputFormat;

/// CLI arguments for verity
#[derive(Parser, Debug)]
#[command(name = "verity")]
#[command(author, version, about = "Ask several providers, check their facts on the web, return the consensus")]
#[command(long_about = r#"
Verity sends your question to every configured provider at once, extracts
the factual claims from each answer, checks them against web evidence and
returns the answer most providers agree on, with a reasoning trace.

The pipeline has four stages:
1. Dispatch:    all providers are queried concurrently under rate limits,
                circuit breakers and a global deadline
2. Extraction:  factual claims are pulled out of every answer
3. Validation:  claims are checked against scraped web pages
4. Integration: answers are clustered and the winner is scored

Configuration files are loaded from (in priority order):
1. --config <path>                 Explicit config file
2. ./verity.toml or ./.verity.toml Project-level config
3. ~/.config/verity/config.toml    Global config
Environment variables VERITY_* override all files (e.g. VERITY_CACHE__SECRET).

Example:
  verity "What is the capital of Australia?"
  verity -p alpha -p bravo -o full "When did the Berlin Wall fall?"
  verity --health
"#)]
pub struct Cli {
    /// The question to answer (not required with --health or --show-config)
    pub query: Option<String>,

    /// Extra context scoping the question (part of the cache key)
    #[arg(long, value_name = "TEXT")]
    pub context: Option<String>,

    /// Caller identity used for rate limiting
    #[arg(long, value_name = "ID")]
    pub caller: Option<String>,

    /// Providers to include (can be specified multiple times; default: all)
    #[arg(short, long, value_name = "PROVIDER")]
    pub provider: Vec<String>,

    /// Output format: full, answer or json
    #[arg(short, long, value_name = "FORMAT")]
    pub output: Option<OutputFormat>,

    /// Bypass the result cache for this query
    #[arg(long)]
    pub no_cache: bool,

    /// Skip web evidence validation
    #[arg(long)]
    pub no_validation: bool,

    /// Probe every provider and exit
    #[arg(long)]
    pub health: bool,

    /// Show configuration file locations and the effective configuration, then exit
    #[arg(long)]
    pub show_config: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Append audit events (JSON lines) to this file
    #[arg(long, value_name = "PATH")]
    pub audit_log: Option<PathBuf>,

    /// Also write logs to a daily-rotated file in this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,
}
