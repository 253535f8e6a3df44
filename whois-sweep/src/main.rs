//! Whois Sweep CLI Application
//!
//! A command-line interface for bulk WHOIS lookups. Domains come from the
//! command line and/or a file; results are printed as text, JSON, CSV or
//! raw registry replies once the batch finishes or is interrupted.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use std::collections::HashSet;
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use whois_sweep_lib::{
    expand_domain_inputs, load_env_config, parse_duration_string, read_domain_file, validate_config, BatchJob,
    BatchReport, BatchScheduler, ConfigManager, EnvConfig, RegistryMap, ResolutionOutcome,
    ResolveConfig, Resolver,
};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Exit status after Ctrl-C, as shells report SIGINT.
const EXIT_INTERRUPTED: i32 = 130;

/// CLI arguments for whois-sweep
#[derive(Parser, Debug)]
#[command(name = "whois-sweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bulk WHOIS lookups with registry routing and provider failover")]
#[command(
    long_about = "Resolve registration data for many domains at once.\n\nQueries each domain's registry over WHOIS (port 43), follows referrals, parses the common reply formats, and falls back to WHOIS APIs when a registry throttles.\nCtrl-C stops after the current chunk and prints what completed."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domain names to look up (full names or bare names)
    #[arg(value_name = "DOMAINS", help_heading = "Input")]
    pub domains: Vec<String>,

    /// Suffixes for bare names (comma-separated or repeated; default: com,net,org,com.tr,co.uk)
    #[arg(short = 't', long = "tld", value_name = "TLD", value_delimiter = ',', action = clap::ArgAction::Append, help_heading = "Input")]
    pub tlds: Option<Vec<String>>,

    /// Input file with domains (one per line, '#' comments)
    #[arg(short = 'f', long = "file", value_name = "FILE", help_heading = "Input")]
    pub file: Option<String>,

    /// Print the suffix to WHOIS server table and exit
    #[arg(long = "list-servers", help_heading = "Input")]
    pub list_servers: bool,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Output results in CSV format
    #[arg(long = "csv", help_heading = "Output Format")]
    pub csv: bool,

    /// Group results by status with section headers
    #[arg(short = 'p', long = "pretty", help_heading = "Output Format")]
    pub pretty: bool,

    /// Print the raw registry reply for each domain
    #[arg(long = "raw", help_heading = "Output Format")]
    pub raw: bool,

    /// Registry session timeout (e.g. "10s", "500ms")
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Resolution")]
    pub timeout: Option<String>,

    /// Retries after a connection failure or timeout (max 10)
    #[arg(long = "retries", value_name = "N", help_heading = "Resolution")]
    pub retries: Option<u32>,

    /// Pause between chunks (e.g. "5s")
    #[arg(long = "chunk-delay", value_name = "DURATION", help_heading = "Resolution")]
    pub chunk_delay: Option<String>,

    /// Do not escalate throttled lookups to WHOIS APIs
    #[arg(long = "no-fallback", help_heading = "Resolution")]
    pub no_fallback: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show debug logs and full error messages
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Pretty,
    Json,
    Csv,
    Raw,
}

impl OutputFormat {
    fn from_args(args: &Args) -> Self {
        if args.json {
            OutputFormat::Json
        } else if args.csv {
            OutputFormat::Csv
        } else if args.raw {
            OutputFormat::Raw
        } else if args.pretty {
            OutputFormat::Pretty
        } else {
            OutputFormat::Text
        }
    }

    fn is_structured(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Csv)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_logging(&args);

    match run_sweep(args).await {
        Ok(true) => process::exit(EXIT_INTERRUPTED),
        Ok(false) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    let output_formats = [args.json, args.csv, args.raw]
        .iter()
        .filter(|&&x| x)
        .count();
    if output_formats > 1 {
        return Err("Cannot specify multiple output formats (--json, --csv, --raw)".to_string());
    }

    if args.pretty && output_formats > 0 {
        return Err("--pretty only applies to text output".to_string());
    }

    Ok(())
}

/// Send logs to stderr. `RUST_LOG` wins over the flags.
fn init_logging(args: &Args) {
    let level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,whois_sweep_lib={level},whois_sweep={level}",
            level = level
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(args.debug)
        .init();
}

/// Main sweep logic. Returns whether the run was interrupted.
async fn run_sweep(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let env_config = load_env_config();
    let config = build_config(&args, &env_config)?;

    if args.list_servers {
        ui::print_servers(&RegistryMap::with_overrides(&config.server_overrides));
        return Ok(false);
    }

    let domains = get_domains_to_check(&args, &env_config)?;
    if domains.is_empty() {
        return Err("You must specify domain names or a file with --file".into());
    }

    let format = OutputFormat::from_args(&args);
    let resolver = Arc::new(Resolver::with_config(config)?);
    let scheduler = BatchScheduler::new(Arc::clone(&resolver));

    if format == OutputFormat::Pretty && domains.len() > 1 {
        ui::print_header(domains.len(), &resolver.provider_names());
    }

    let job = BatchJob::new(domains);
    let total = job.len();
    let cancel = CancellationToken::new();
    let interrupt = spawn_interrupt_watcher(cancel.clone());

    let spinner = if !format.is_structured() && total > 1 {
        ui::Spinner::start(job.progress())
    } else {
        None
    };

    let start_time = std::time::Instant::now();
    let report = scheduler.run(job, &cancel, |_| {}).await;
    let duration = start_time.elapsed();

    interrupt.abort();
    if let Some(s) = spinner {
        s.stop().await;
    }

    display_results(&report, format, args.debug, duration)?;

    if report.cancelled {
        ui::print_interrupted(report.outcomes.len(), total);
    }
    Ok(report.cancelled)
}

/// Cancel the batch on the first Ctrl-C.
fn spawn_interrupt_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current chunk");
            cancel.cancel();
        }
    })
}

/// Build ResolveConfig from CLI arguments with config file integration.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments (explicit user input)
/// 2. Environment variables (WS_*)
/// 3. Explicit config file (--config, then WS_CONFIG) or discovered files
/// 4. Built-in defaults
fn build_config(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<ResolveConfig, Box<dyn std::error::Error>> {
    let explicit = args.config.as_deref().or(env_config.config.as_deref());

    let file_config = ConfigManager::new(args.verbose)
        .load(explicit.map(Path::new))
        .map_err(|e| match explicit {
            Some(path) => format!("Failed to load config file '{}': {}", path, e),
            None => e.to_string(),
        })?;

    let config = file_config.apply_to(ResolveConfig::default());
    let config = env_config.apply_to(config);
    let config = apply_cli_args_to_config(config, args)?;

    validate_config(&config)?;
    Ok(config)
}

/// Apply CLI arguments to config (highest precedence).
fn apply_cli_args_to_config(
    mut config: ResolveConfig,
    args: &Args,
) -> Result<ResolveConfig, Box<dyn std::error::Error>> {
    if let Some(timeout) = &args.timeout {
        config.timeout = parse_duration_string(timeout).ok_or_else(|| {
            format!(
                "Invalid timeout '{}'. Use a format like '500ms', '5s', '2m'",
                timeout
            )
        })?;
    }
    if let Some(retries) = args.retries {
        config.max_retries = retries;
    }
    if let Some(delay) = &args.chunk_delay {
        config.chunk_delay = parse_duration_string(delay).ok_or_else(|| {
            format!(
                "Invalid chunk delay '{}'. Use a format like '500ms', '5s', '2m'",
                delay
            )
        })?;
    }
    // Only override when the flag is passed, so config/env can disable it too.
    if args.no_fallback {
        config.enable_fallback = false;
    }
    Ok(config)
}

/// Collect domains from arguments and the input file.
///
/// Bare names expand across `--tld` (or the default suffixes). Duplicates (ignoring case and a trailing dot) are dropped, keeping the
/// first occurrence.
fn get_domains_to_check(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut inputs: Vec<String> = args
        .domains
        .iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();

    if let Some(path) = args.file.as_deref().or(env_config.file.as_deref()) {
        inputs.extend(read_domain_file(path)?);
    }

    let mut domains = expand_domain_inputs(&inputs, &args.tlds);

    let mut seen = HashSet::new();
    domains.retain(|d| seen.insert(d.trim_end_matches('.').to_lowercase()));
    Ok(domains)
}

fn display_results(
    report: &BatchReport,
    format: OutputFormat,
    debug: bool,
    duration: std::time::Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => display_json_results(&report.outcomes)?,
        OutputFormat::Csv => display_csv_results(&report.outcomes),
        OutputFormat::Raw => display_raw_results(&report.outcomes),
        OutputFormat::Text | OutputFormat::Pretty => {
            display_text_results(report, format == OutputFormat::Pretty, debug, duration)
        }
    }
    Ok(())
}

/// Display results in JSON format
fn display_json_results(outcomes: &[ResolutionOutcome]) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(outcomes)?);
    Ok(())
}

/// Display results in CSV format
fn display_csv_results(outcomes: &[ResolutionOutcome]) {
    println!("domain,success,available,registrar,created,expires,status,server,error");

    for outcome in outcomes {
        let record = outcome.record.as_ref();
        let available = match record {
            Some(r) => r.is_available.to_string(),
            None => "unknown".to_string(),
        };
        let registrar = record.and_then(|r| r.registrar.clone()).unwrap_or_default();
        let created = record
            .and_then(|r| r.creation_date.as_ref())
            .map(|d| d.to_string())
            .unwrap_or_default();
        let expires = record
            .and_then(|r| r.expiration_date.as_ref())
            .map(|d| d.to_string())
            .unwrap_or_default();
        let status = record.and_then(|r| r.status.clone()).unwrap_or_default();
        let error = outcome
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();

        let row = [
            outcome.domain.as_str(),
            if outcome.success { "true" } else { "false" },
            available.as_str(),
            registrar.as_str(),
            created.as_str(),
            expires.as_str(),
            status.as_str(),
            outcome.server.as_str(),
            error.as_str(),
        ];
        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        println!("{}", fields.join(","));
    }
}

/// Quote a CSV field when it contains a separator, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Print each registry reply under a header line
fn display_raw_results(outcomes: &[ResolutionOutcome]) {
    for outcome in outcomes {
        println!("=== {} ({}) ===", outcome.domain, outcome.server);
        match (&outcome.record, &outcome.error) {
            (Some(record), _) if !record.raw_text.is_empty() => {
                println!("{}", record.raw_text.trim_end())
            }
            (Some(_), _) => println!("(no reply text)"),
            (None, Some(error)) => println!("error: {}", error),
            (None, None) => {}
        }
        println!();
    }
}

/// Display results in human-readable text format
fn display_text_results(
    report: &BatchReport,
    pretty: bool,
    debug: bool,
    duration: std::time::Duration,
) {
    let outcomes = &report.outcomes;
    if pretty {
        ui::print_grouped_outcomes(outcomes, debug);
    } else {
        for outcome in outcomes {
            ui::print_outcome(outcome, debug);
        }
    }

    if outcomes.len() > 1 {
        let available = outcomes
            .iter()
            .filter(|o| o.record.as_ref().is_some_and(|r| r.is_available))
            .count();
        let failed = report.failed();
        println!();
        ui::print_summary(
            outcomes.len(),
            available,
            outcomes.len() - available - failed,
            failed,
            duration,
        );
    }
}
