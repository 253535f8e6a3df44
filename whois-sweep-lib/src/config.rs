//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `WS_*`
//! environment variables, merging them with proper precedence rules, and
//! applying the result to a [`ResolveConfig`].
//!
//! Precedence, highest first: CLI arguments (applied by the binaries),
//! environment, config file, built-in defaults.

use crate::error::ResolveError;
use crate::providers::KNOWN_PROVIDERS;
use crate::types::ResolveConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_RETRIES_LIMIT: u32 = 10;
const MAX_HOPS_LIMIT: u32 = 10;

/// Configuration loaded from TOML files.
///
/// ```toml
/// [defaults]
/// timeout = "30s"
/// max_retries = 3
/// retry_delay = "3s"
/// max_referral_hops = 3
///
/// [batch]
/// chunk_delay = "5s"
///
/// [providers]
/// order = ["jsonwhoisapi", "whoisfreaks"]
/// throttle_delay = "30s"
/// enabled = true
///
/// [servers]
/// "com.tr" = "whois.trabis.gov.tr"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FileConfig {
    /// Resolver defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Batch scheduling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<BatchConfig>,

    /// Fallback provider chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<ProvidersConfig>,

    /// Suffix to WHOIS server overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<HashMap<String, String>>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DefaultsConfig {
    /// Registry session timeout (e.g. "30s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Retries after a connection failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Wait between retries (e.g. "3s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<String>,

    /// Referral hops to follow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_referral_hops: Option<u32>,
}

/// `[batch]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BatchConfig {
    /// Pause between chunks (e.g. "5s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_delay: Option<String>,
}

/// `[providers]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProvidersConfig {
    /// Escalation order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,

    /// Backoff before a throttled provider retries (e.g. "30s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_delay: Option<String>,

    /// Whether to escalate at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl FileConfig {
    /// Layer this file's values over `config`.
    ///
    /// Durations were checked by validation, so unparsable ones cannot
    /// occur for loaded files; they are ignored if they do.
    pub fn apply_to(&self, mut config: ResolveConfig) -> ResolveConfig {
        if let Some(defaults) = &self.defaults {
            if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_duration_string) {
                config.timeout = timeout;
            }
            if let Some(retries) = defaults.max_retries {
                config.max_retries = retries;
            }
            if let Some(delay) = defaults.retry_delay.as_deref().and_then(parse_duration_string) {
                config.retry_delay = delay;
            }
            if let Some(hops) = defaults.max_referral_hops {
                config.max_referral_hops = hops;
            }
        }

        if let Some(delay) = self
            .batch
            .as_ref()
            .and_then(|b| b.chunk_delay.as_deref())
            .and_then(parse_duration_string)
        {
            config.chunk_delay = delay;
        }

        if let Some(providers) = &self.providers {
            if let Some(order) = &providers.order {
                config.provider_order = order.iter().map(|p| p.trim().to_lowercase()).collect();
            }
            if let Some(delay) = providers
                .throttle_delay
                .as_deref()
                .and_then(parse_duration_string)
            {
                config.throttle_delay = delay;
            }
            if let Some(enabled) = providers.enabled {
                config.enable_fallback = enabled;
            }
        }

        if let Some(servers) = &self.servers {
            for (suffix, host) in servers {
                config
                    .server_overrides
                    .insert(suffix.trim().to_lowercase(), host.trim().to_string());
            }
        }

        config
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to log which files were found
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load an explicit file if given, otherwise discover files.
    ///
    /// # Errors
    ///
    /// An explicit file that is missing or invalid is an error; discovered
    /// files that fail to load are skipped with a warning.
    pub fn load(&self, explicit: Option<&Path>) -> Result<FileConfig, ResolveError> {
        match explicit {
            Some(path) => self.load_file(path),
            None => self.discover_and_load(),
        }
    }

    /// Load configuration from a specific file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error if reading, parsing or
    /// validation fails.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, ResolveError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ResolveError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            ResolveError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content).map_err(|e| {
            ResolveError::config(format!("Failed to parse TOML configuration: {}", e))
        })?;

        validate_file_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is lowest, then the home directory file, then the local
    /// file. Later files override earlier ones field by field.
    pub fn discover_and_load(&self) -> Result<FileConfig, ResolveError> {
        let mut merged = FileConfig::default();
        let mut loaded = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];
        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged = merge_configs(merged, config);
                    loaded.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping config file"),
            }
        }

        if self.verbose {
            for path in &loaded {
                debug!(path = %path.display(), "loaded config file");
            }
        }

        Ok(merged)
    }

    /// Local file in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./whois-sweep.toml", "./.whois-sweep.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    /// File in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".whois-sweep.toml", "whois-sweep.toml"]
            .iter()
            .map(|name| Path::new(&home).join(name))
            .find(|p| p.exists())
    }

    /// File following the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("whois-sweep").join("config.toml");
        path.exists().then_some(path)
    }
}

/// Merge two configurations; values from `higher` win.
fn merge_configs(lower: FileConfig, higher: FileConfig) -> FileConfig {
    FileConfig {
        defaults: match (lower.defaults, higher.defaults) {
            (Some(mut lower), Some(higher)) => {
                if higher.timeout.is_some() {
                    lower.timeout = higher.timeout;
                }
                if higher.max_retries.is_some() {
                    lower.max_retries = higher.max_retries;
                }
                if higher.retry_delay.is_some() {
                    lower.retry_delay = higher.retry_delay;
                }
                if higher.max_referral_hops.is_some() {
                    lower.max_referral_hops = higher.max_referral_hops;
                }
                Some(lower)
            }
            (lower, higher) => higher.or(lower),
        },
        batch: match (lower.batch, higher.batch) {
            (Some(lower), Some(higher)) => Some(BatchConfig {
                chunk_delay: higher.chunk_delay.or(lower.chunk_delay),
            }),
            (lower, higher) => higher.or(lower),
        },
        providers: match (lower.providers, higher.providers) {
            (Some(lower), Some(higher)) => Some(ProvidersConfig {
                order: higher.order.or(lower.order),
                throttle_delay: higher.throttle_delay.or(lower.throttle_delay),
                enabled: higher.enabled.or(lower.enabled),
            }),
            (lower, higher) => higher.or(lower),
        },
        servers: match (lower.servers, higher.servers) {
            (Some(mut lower), Some(higher)) => {
                lower.extend(higher);
                Some(lower)
            }
            (lower, higher) => higher.or(lower),
        },
    }
}

/// Validate a loaded file before it is applied.
fn validate_file_config(config: &FileConfig) -> Result<(), ResolveError> {
    let duration = |name: &str, value: &Option<String>| -> Result<(), ResolveError> {
        match value {
            Some(v) if parse_duration_string(v).is_none() => Err(ResolveError::config(format!(
                "Invalid {} '{}'. Use a format like '500ms', '5s', '2m'",
                name, v
            ))),
            _ => Ok(()),
        }
    };

    if let Some(defaults) = &config.defaults {
        duration("timeout", &defaults.timeout)?;
        duration("retry_delay", &defaults.retry_delay)?;
    }
    if let Some(batch) = &config.batch {
        duration("chunk_delay", &batch.chunk_delay)?;
    }
    if let Some(providers) = &config.providers {
        duration("throttle_delay", &providers.throttle_delay)?;
    }

    // Range and name checks are shared with env/CLI values.
    validate_config(&config.apply_to(ResolveConfig::default()))
}

/// Check a fully assembled configuration.
///
/// # Errors
///
/// `ResolveError::Config` for a zero timeout, more than 10 retries or
/// referral hops, an unknown provider name, or an empty server entry.
pub fn validate_config(config: &ResolveConfig) -> Result<(), ResolveError> {
    if config.timeout.is_zero() {
        return Err(ResolveError::config("Timeout must be greater than zero"));
    }
    if config.max_retries > MAX_RETRIES_LIMIT {
        return Err(ResolveError::config(format!(
            "max_retries must be at most {}",
            MAX_RETRIES_LIMIT
        )));
    }
    if config.max_referral_hops > MAX_HOPS_LIMIT {
        return Err(ResolveError::config(format!(
            "max_referral_hops must be at most {}",
            MAX_HOPS_LIMIT
        )));
    }
    if let Some(unknown) = config
        .provider_order
        .iter()
        .find(|p| !KNOWN_PROVIDERS.contains(&p.as_str()))
    {
        return Err(ResolveError::config(format!(
            "Unknown provider '{}'. Known providers: {}",
            unknown,
            KNOWN_PROVIDERS.join(", ")
        )));
    }
    for (suffix, host) in &config.server_overrides {
        if suffix.is_empty() || host.is_empty() {
            return Err(ResolveError::config(format!(
                "Server entries need a suffix and a host (got '{}' = '{}')",
                suffix, host
            )));
        }
    }
    Ok(())
}

/// Environment variable configuration that mirrors CLI options.
///
/// Populated from `WS_*` variables. Invalid values are logged and ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub chunk_delay: Option<Duration>,
    pub fallback: Option<bool>,
    pub providers: Option<Vec<String>>,
    pub config: Option<String>,
    pub file: Option<String>,
}

impl EnvConfig {
    /// Read `WS_*` values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env_config = EnvConfig::default();

        let duration = |name: &str| {
            let raw = lookup(name)?;
            let parsed = parse_duration_string(&raw);
            if parsed.is_none() {
                warn!("Invalid {}='{}', use a format like '5s', '30s', '2m'", name, raw);
            }
            parsed
        };
        env_config.timeout = duration("WS_TIMEOUT");
        env_config.retry_delay = duration("WS_RETRY_DELAY");
        env_config.chunk_delay = duration("WS_CHUNK_DELAY");

        if let Some(val) = lookup("WS_RETRIES") {
            match val.trim().parse::<u32>() {
                Ok(retries) if retries <= MAX_RETRIES_LIMIT => env_config.retries = Some(retries),
                _ => warn!("Invalid WS_RETRIES='{}', must be 0-{}", val, MAX_RETRIES_LIMIT),
            }
        }

        if let Some(val) = lookup("WS_FALLBACK") {
            match val.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => env_config.fallback = Some(true),
                "false" | "0" | "no" | "off" => env_config.fallback = Some(false),
                _ => warn!("Invalid WS_FALLBACK='{}', use true/false", val),
            }
        }

        if let Some(val) = lookup("WS_PROVIDERS") {
            let providers: Vec<String> = val
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            match providers
                .iter()
                .find(|p| !KNOWN_PROVIDERS.contains(&p.as_str()))
            {
                Some(unknown) => warn!("Ignoring WS_PROVIDERS: unknown provider '{}'", unknown),
                None => env_config.providers = Some(providers),
            }
        }

        env_config.config = lookup("WS_CONFIG").filter(|v| !v.trim().is_empty());
        env_config.file = lookup("WS_FILE").filter(|v| !v.trim().is_empty());

        env_config
    }

    /// Layer these values over `config`.
    pub fn apply_to(&self, mut config: ResolveConfig) -> ResolveConfig {
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if let Some(delay) = self.retry_delay {
            config.retry_delay = delay;
        }
        if let Some(delay) = self.chunk_delay {
            config.chunk_delay = delay;
        }
        if let Some(enabled) = self.fallback {
            config.enable_fallback = enabled;
        }
        if let Some(providers) = &self.providers {
            config.provider_order = providers.clone();
        }
        config
    }
}

/// Load configuration from the process environment.
pub fn load_env_config() -> EnvConfig {
    EnvConfig::from_lookup(|name| env::var(name).ok())
}

/// Parse a duration like "500ms", "5s", "2m", or bare seconds.
///
/// # Returns
///
/// The duration, or None if parsing fails.
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .map(|m| Duration::from_secs(m * 60))
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_duration_string() {
        assert_eq!(parse_duration_string("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration_string("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration_string("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration_string(" 30 "), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration_string("invalid"), None);
        assert_eq!(parse_duration_string("-5s"), None);
    }

    #[test]
    fn test_load_and_apply_config() {
        let file = write_config(
            r#"
[defaults]
timeout = "10s"
max_retries = 1
retry_delay = "500ms"

[batch]
chunk_delay = "0s"

[providers]
order = ["whoisfreaks", "ApiNinjas"]
throttle_delay = "1m"

[servers]
"CO.UK" = "whois.proxy.test"
"#,
        );

        let config = ConfigManager::new(false).load_file(file.path()).unwrap();
        let resolved = config.apply_to(ResolveConfig::default());

        assert_eq!(resolved.timeout, Duration::from_secs(10));
        assert_eq!(resolved.max_retries, 1);
        assert_eq!(resolved.retry_delay, Duration::from_millis(500));
        assert_eq!(resolved.max_referral_hops, 3);
        assert_eq!(resolved.chunk_delay, Duration::ZERO);
        assert_eq!(resolved.provider_order, vec!["whoisfreaks", "apininjas"]);
        assert_eq!(resolved.throttle_delay, Duration::from_secs(60));
        assert!(resolved.enable_fallback);
        assert_eq!(resolved.server_overrides["co.uk"], "whois.proxy.test");
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            "[defaults]\ntimeout = \"0s\"\n",
            "[defaults]\ntimeout = \"soon\"\n",
            "[defaults]\nmax_retries = 11\n",
            "[defaults]\nmax_referral_hops = 20\n",
            "[providers]\norder = [\"whoisxml\"]\n",
            "[servers]\ncom = \"\"\n",
            "[defaults\n",
        ];
        for content in cases {
            let file = write_config(content);
            let result = ConfigManager::new(false).load_file(file.path());
            assert!(result.is_err(), "accepted: {}", content);
        }
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = ConfigManager::new(false)
            .load(Some(Path::new("/nonexistent/whois-sweep.toml")))
            .unwrap_err();
        assert_eq!(err.kind(), "file");
    }

    #[test]
    fn test_merge_configs() {
        let lower = FileConfig {
            defaults: Some(DefaultsConfig {
                timeout: Some("10s".to_string()),
                max_retries: Some(2),
                ..Default::default()
            }),
            servers: Some(HashMap::from([("io".to_string(), "a.test".to_string())])),
            ..Default::default()
        };
        let higher = FileConfig {
            defaults: Some(DefaultsConfig {
                max_retries: Some(5),
                ..Default::default()
            }),
            servers: Some(HashMap::from([("me".to_string(), "b.test".to_string())])),
            ..Default::default()
        };

        let merged = merge_configs(lower, higher);
        let defaults = merged.defaults.unwrap();
        assert_eq!(defaults.timeout.as_deref(), Some("10s"));
        assert_eq!(defaults.max_retries, Some(5));
        assert_eq!(merged.servers.unwrap().len(), 2);
    }

    #[test]
    fn test_env_config_from_lookup() {
        let vars = HashMap::from([
            ("WS_TIMEOUT", "15s"),
            ("WS_RETRIES", "2"),
            ("WS_CHUNK_DELAY", "bogus"),
            ("WS_FALLBACK", "off"),
            ("WS_PROVIDERS", "apininjas, jsonwhoisapi"),
            ("WS_FILE", "domains.txt"),
        ]);
        let env_config = EnvConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(env_config.timeout, Some(Duration::from_secs(15)));
        assert_eq!(env_config.retries, Some(2));
        assert_eq!(env_config.chunk_delay, None);
        assert_eq!(env_config.fallback, Some(false));
        assert_eq!(
            env_config.providers,
            Some(vec!["apininjas".to_string(), "jsonwhoisapi".to_string()])
        );
        assert_eq!(env_config.file.as_deref(), Some("domains.txt"));

        let resolved = env_config.apply_to(ResolveConfig::default());
        assert_eq!(resolved.timeout, Duration::from_secs(15));
        assert!(!resolved.enable_fallback);
        assert!(validate_config(&resolved).is_ok());
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let vars = HashMap::from([("WS_RETRIES", "99"), ("WS_PROVIDERS", "nope")]);
        let env_config = EnvConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(env_config, EnvConfig::default());
    }
}
