//! # Whois Sweep Library
//!
//! A bulk WHOIS resolution engine: routes each domain to its registry's
//! WHOIS server, queries it over port 43 with bounded retries and referral
//! following, parses the reply in any of the common registry formats, and
//! escalates to paid WHOIS APIs when the registry throttles us.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use whois_sweep_lib::{BatchJob, BatchScheduler, Resolver};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = Arc::new(Resolver::new()?);
//!     let scheduler = BatchScheduler::new(resolver);
//!
//!     let job = BatchJob::new(vec!["example.com".into(), "example.co.uk".into()]);
//!     let report = scheduler
//!         .run(job, &CancellationToken::new(), |chunk| {
//!             println!("chunk {} done", chunk.index + 1);
//!         })
//!         .await;
//!
//!     for outcome in &report.outcomes {
//!         println!("{} -> {}", outcome.domain, outcome.success);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Registry routing**: built-in suffix table with compound suffixes
//!   (`co.uk`, `com.tr`) and per-suffix overrides
//! - **Referral following**: thin registries hand off to registrar servers
//! - **Multi-format parsing**: generic `Key: value`, `** Section:` and
//!   Nominet-style layouts with date normalization
//! - **Provider failover**: JsonWhoisAPI, WhoisFreaks, API Ninjas
//! - **Adaptive batching**: chunk sizes follow the observed success rate

pub use batch::{BatchJob, BatchReport, BatchScheduler, ChunkReport};
pub use config::{
    load_env_config, parse_duration_string, validate_config, ConfigManager, EnvConfig, FileConfig,
};
pub use error::ResolveError;
pub use parser::parse;
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use protocols::{RegistryMap, TcpTransport, WhoisClient, WhoisTransport};
pub use providers::{
    ApiNinjasProvider, Backoff, FallbackProvider, JsonWhoisProvider, WhoisFreaksProvider,
    KNOWN_PROVIDERS,
};
pub use resolver::Resolver;
pub use types::{DomainQuery, RecordDate, ResolutionOutcome, ResolveConfig, WhoisRecord};
pub use utils::{expand_domain_inputs, parse_domain_list, read_domain_file, DEFAULT_TLDS};

pub mod batch;
pub mod parser;
pub mod protocols;
pub mod providers;
pub mod resolver;

mod config;
mod error;
mod progress;
mod types;
mod utils;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ResolveError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
