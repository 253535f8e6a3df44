//! Protocol implementations for domain resolution.
//!
//! This module contains the registry routing table and the WHOIS text
//! protocol client.

/// WHOIS protocol implementation
pub mod whois;

/// Suffix to server mappings
pub mod registry;

// Re-export commonly used functions and types
pub use registry::RegistryMap;
pub use whois::{parse_referral, TcpTransport, WhoisClient, WhoisTransport};
