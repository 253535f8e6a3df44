//! Text-mode display logic for the whois-sweep CLI.
//!
//! This module handles human-readable output: colored result lines,
//! grouped `--pretty` output, the progress spinner, headers and summaries.
//! Uses only the `console` crate.

use console::{pad_str, style, Alignment, Term};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use whois_sweep_lib::{ProgressTracker, RegistryMap, ResolutionOutcome, WhoisRecord};

const DOMAIN_WIDTH: usize = 30;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// A braille-dot spinner showing batch progress on stderr so stdout stays
/// clean.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// Start a spinner fed by `progress`. Returns None if stderr isn't a TTY.
    pub fn start(progress: ProgressTracker) -> Option<Self> {
        let term = Term::stderr();
        if !term.is_term() {
            return None;
        }

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!(
                    "{} {}",
                    style(frame).cyan(),
                    progress_message(&progress)
                ));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Some(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

fn progress_message(progress: &ProgressTracker) -> String {
    let snapshot = progress.snapshot();
    format!(
        "Resolving {}/{} domains ({}%)...",
        snapshot.processed, snapshot.total, snapshot.percentage
    )
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a pretty run.
pub fn print_header(domain_count: usize, providers: &[&str]) {
    println!(
        "{} {} {}",
        style("whois-sweep").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "· Resolving {} domain{}",
            domain_count,
            if domain_count == 1 { "" } else { "s" }
        ))
        .dim(),
    );

    let fallback = if providers.is_empty() {
        "Fallback: off".to_string()
    } else {
        format!("Fallback: {}", providers.join(" > "))
    };
    println!("{}", style(fallback).dim());
    println!();
}

// ── Single result line ───────────────────────────────────────────────────────

/// Print one outcome as a colored, aligned line.
pub fn print_outcome(outcome: &ResolutionOutcome, debug: bool) {
    let padded = pad_str(&outcome.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));

    match &outcome.record {
        Some(record) if record.is_available => {
            println!(
                "  {}  {}",
                style(&padded).white(),
                style("AVAILABLE").green().bold(),
            );
        }
        Some(record) => {
            println!(
                "  {}  {}  {}",
                style(&padded).white(),
                style("REGISTERED").red().bold(),
                style(format_record_info(record)).dim(),
            );
        }
        None => {
            println!(
                "  {}  {}  {}",
                style(&padded).white(),
                style("FAILED").yellow(),
                style(brief_error(outcome)).dim(),
            );
        }
    }

    if debug {
        print_debug_line(outcome, "    ");
    }
}

fn print_debug_line(outcome: &ResolutionOutcome, indent: &str) {
    match &outcome.error {
        Some(error) => println!("{}{} {}", indent, style("└─").dim(), error),
        None => println!("{}{} via {}", indent, style("└─").dim(), outcome.server),
    }
}

// ── Grouped output ───────────────────────────────────────────────────────────

/// Print outcomes grouped by status: Available, Registered, Failed.
/// Empty sections are omitted entirely.
pub fn print_grouped_outcomes(outcomes: &[ResolutionOutcome], debug: bool) {
    let mut available: Vec<&ResolutionOutcome> = Vec::new();
    let mut registered: Vec<&ResolutionOutcome> = Vec::new();
    let mut failed: Vec<&ResolutionOutcome> = Vec::new();

    for o in outcomes {
        match &o.record {
            Some(r) if r.is_available => available.push(o),
            Some(_) => registered.push(o),
            None => failed.push(o),
        }
    }

    if !available.is_empty() {
        println!(
            "  {} {}",
            style(format!("── Available ({}) ", available.len()))
                .green()
                .bold(),
            style("─".repeat(40)).green().dim(),
        );
        for o in &available {
            print_grouped_line(o, debug);
        }
        println!();
    }

    if !registered.is_empty() {
        println!(
            "  {} {}",
            style(format!("── Registered ({}) ", registered.len()))
                .red()
                .bold(),
            style("─".repeat(39)).red().dim(),
        );
        for o in &registered {
            print_grouped_line(o, debug);
        }
        println!();
    }

    if !failed.is_empty() {
        println!(
            "  {} {}",
            style(format!("── Failed ({}) ", failed.len())).yellow().bold(),
            style("─".repeat(43)).yellow().dim(),
        );
        for o in &failed {
            print_grouped_line(o, debug);
        }
        println!();
    }
}

fn print_grouped_line(outcome: &ResolutionOutcome, debug: bool) {
    let padded = pad_str(&outcome.domain, DOMAIN_WIDTH, Alignment::Left, Some(".."));

    match &outcome.record {
        Some(record) if record.is_available => println!("    {}", style(&padded).white()),
        Some(record) => println!(
            "    {}  {}",
            style(&padded).white(),
            style(format_record_info(record)).dim()
        ),
        None => println!(
            "    {}  {}",
            style(&padded).white(),
            style(brief_error(outcome)).dim()
        ),
    }

    if debug {
        print_debug_line(outcome, "      ");
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts.
pub fn print_summary(
    total: usize,
    available: usize,
    registered: usize,
    failed: usize,
    duration: Duration,
) {
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} available", available)).green(),
        style("|").dim(),
        style(format!("{} registered", registered)).red(),
        style("|").dim(),
        style(format!("{} failed", failed)).yellow(),
    );
}

/// Note on stderr that the run stopped early.
pub fn print_interrupted(completed: usize, total: usize) {
    eprintln!(
        "{}",
        style(format!(
            "Interrupted: {} of {} domains resolved",
            completed, total
        ))
        .yellow()
    );
}

/// Print the routing table, one suffix per line.
pub fn print_servers(registry: &RegistryMap) {
    for suffix in registry.known_suffixes() {
        if let Ok(server) = registry.lookup(&suffix) {
            println!(
                "  {}  {}",
                style(pad_str(&suffix, 12, Alignment::Left, None)).green(),
                server
            );
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Format record details (registrar, dates) into a concise string.
pub fn format_record_info(record: &WhoisRecord) -> String {
    let mut parts = Vec::new();
    if let Some(registrar) = &record.registrar {
        parts.push(format!("Registrar: {}", registrar));
    }
    if let Some(created) = &record.creation_date {
        parts.push(format!("Created: {}", created));
    }
    if let Some(expires) = &record.expiration_date {
        parts.push(format!("Expires: {}", expires));
    }
    if parts.is_empty() {
        "No info available".to_string()
    } else {
        parts.join(", ")
    }
}

/// Brief reason for a failed outcome, keyed on the error kind.
fn brief_error(outcome: &ResolutionOutcome) -> &'static str {
    match outcome.error_kind {
        Some("invalid_domain") => "(invalid domain)",
        Some("unsupported_suffix") => "(unsupported suffix)",
        Some("timeout") => "(timeout)",
        Some("connection") => "(network error)",
        Some("rate_limited") => "(rate limited)",
        Some("provider") => "(provider error)",
        Some(_) => "(error)",
        None => "(unknown status)",
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use whois_sweep_lib::{RecordDate, ResolveError};

    #[test]
    fn test_brief_error_by_kind() {
        let timeout = ResolutionOutcome::failure(
            "a.com",
            ResolveError::timeout("whois.verisign-grs.com", Duration::from_secs(30)),
            "whois.verisign-grs.com",
        );
        assert_eq!(brief_error(&timeout), "(timeout)");

        let unsupported = ResolutionOutcome::failure(
            "a.zzzz",
            ResolveError::unsupported_suffix("a.zzzz", "zzzz"),
            "unknown",
        );
        assert_eq!(brief_error(&unsupported), "(unsupported suffix)");

        let ok = ResolutionOutcome::success("a.com", WhoisRecord::default(), "whois.verisign-grs.com");
        assert_eq!(brief_error(&ok), "(unknown status)");
    }

    #[test]
    fn test_format_record_info_all_fields() {
        let record = WhoisRecord {
            registrar: Some("Example Corp".to_string()),
            creation_date: Some(RecordDate::Raw("1995-08-14".to_string())),
            expiration_date: Some(RecordDate::Raw("before 2030".to_string())),
            ..Default::default()
        };
        let formatted = format_record_info(&record);
        assert!(formatted.contains("Registrar: Example Corp"));
        assert!(formatted.contains("Created: 1995-08-14"));
        assert!(formatted.contains("Expires: before 2030"));
    }

    #[test]
    fn test_format_record_info_empty() {
        assert_eq!(format_record_info(&WhoisRecord::default()), "No info available");
    }

    #[test]
    fn test_progress_message() {
        let progress = ProgressTracker::new(4);
        progress.advance();
        assert_eq!(
            progress_message(&progress),
            "Resolving 1/4 domains (25%)..."
        );
    }
}
