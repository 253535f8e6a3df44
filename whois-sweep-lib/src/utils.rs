//! Utility functions for domain processing and validation.
//!
//! Helpers for normalizing user input, validating domain syntax, and
//! reading domain lists from files.

use crate::error::ResolveError;
use regex::Regex;
use std::path::Path;

lazy_static::lazy_static! {
    /// A single DNS label: alphanumerics and inner hyphens, 1-63 chars.
    static ref LABEL_RE: Regex =
        Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").expect("label pattern is valid");
}

/// Suffixes a bare name expands to when no list is given.
pub const DEFAULT_TLDS: &[&str] = &["com", "net", "org", "com.tr", "co.uk"];

/// Lowercase a domain and strip whitespace and a trailing root dot.
pub fn normalize_domain(input: &str) -> String {
    input.trim().trim_end_matches('.').to_lowercase()
}

/// Validate a normalized domain name.
///
/// Requires at least two labels, each a valid DNS label, and a total length
/// of at most 253 characters. Punycode labels (`xn--`) pass; raw Unicode does
/// not.
///
/// # Arguments
///
/// * `domain` - The domain name to validate, already normalized
///
/// # Returns
///
/// `Ok(())` if valid, `Err(ResolveError::InvalidDomain)` if invalid.
pub fn validate_domain(domain: &str) -> Result<(), ResolveError> {
    if domain.is_empty() {
        return Err(ResolveError::invalid_domain(
            domain,
            "Domain name cannot be empty",
        ));
    }

    if domain.len() > 253 {
        return Err(ResolveError::invalid_domain(domain, "Domain name too long"));
    }

    if !domain.contains('.') {
        return Err(ResolveError::invalid_domain(
            domain,
            "Domain name must include a suffix",
        ));
    }

    if let Some(label) = domain.split('.').find(|l| !LABEL_RE.is_match(l)) {
        return Err(ResolveError::invalid_domain(
            domain,
            format!("Invalid label '{}'", label),
        ));
    }

    Ok(())
}

/// Expand bare names into full domains.
///
/// An entry without a dot that is a valid DNS label becomes one domain per
/// suffix in `tlds` ([`DEFAULT_TLDS`] when `None`). Everything else passes
/// through trimmed, so malformed entries still surface as failed outcomes.
/// Blank entries are dropped.
///
/// ```rust
/// use whois_sweep_lib::expand_domain_inputs;
///
/// let tlds = Some(vec!["com".to_string(), ".io".to_string()]);
/// let domains = expand_domain_inputs(&["ornek".to_string(), "a.net".to_string()], &tlds);
/// assert_eq!(domains, vec!["ornek.com", "ornek.io", "a.net"]);
/// ```
pub fn expand_domain_inputs(domains: &[String], tlds: &Option<Vec<String>>) -> Vec<String> {
    let suffixes: Vec<String> = match tlds {
        Some(list) => list
            .iter()
            .map(|t| t.trim().trim_start_matches('.').to_lowercase())
            .filter(|t| !t.is_empty())
            .collect(),
        None => DEFAULT_TLDS.iter().map(|t| t.to_string()).collect(),
    };

    let mut results = Vec::new();
    for domain in domains {
        let trimmed = domain.trim();
        if trimmed.is_empty() {
            continue;
        }

        let name = normalize_domain(trimmed);
        if !name.contains('.') && LABEL_RE.is_match(&name) {
            results.extend(suffixes.iter().map(|tld| format!("{}.{}", name, tld)));
        } else {
            results.push(trimmed.to_string());
        }
    }

    results
}

/// Parse a domain list: one domain per line, `#` starts a comment.
///
/// Blank lines are skipped and inline comments are stripped. Entries are
/// returned as written (trimmed); validation happens per domain during
/// resolution so a bad line yields a failed outcome instead of aborting.
pub fn parse_domain_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a domain list file.
///
/// # Errors
///
/// Returns `ResolveError::File` if the file cannot be read or contains no
/// domains.
pub fn read_domain_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>, ResolveError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| ResolveError::file_error(path.display().to_string(), e.to_string()))?;

    let domains = parse_domain_list(&content);
    if domains.is_empty() {
        return Err(ResolveError::file_error(
            path.display().to_string(),
            "No domains found in file",
        ));
    }

    Ok(domains)
}
