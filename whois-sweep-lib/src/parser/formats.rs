//! Registry reply conventions.
//!
//! Each variant of [`ReplyFormat`] pairs a detection predicate with the
//! extraction rules for one family of registry replies. [`FORMATS`] is
//! consulted in order and the first variant whose predicate holds wins;
//! `Generic` always matches, so it must stay last.

/// Known reply conventions, in detection order.
pub const FORMATS: &[ReplyFormat] = &[
    ReplyFormat::LabeledStar,
    ReplyFormat::Nominet,
    ReplyFormat::Generic,
];

/// A family of registry reply layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    /// `** Section:` headers with dotted keys (TRABIS, `.com.tr`)
    LabeledStar,
    /// Indented blocks under headers, bracketed registrar tags (Nominet, `.uk`)
    Nominet,
    /// `Key: Value` lines (Verisign, most gTLD registries)
    Generic,
}

/// Field slots a line can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Registrar,
    Created,
    Expires,
    Status,
    NameServer,
}

/// Generic key table. Keys are matched lowercased and exact.
const GENERIC_KEYS: &[(&str, Field)] = &[
    ("registrar", Field::Registrar),
    ("sponsoring registrar", Field::Registrar),
    ("registrar name", Field::Registrar),
    ("creation date", Field::Created),
    ("created", Field::Created),
    ("created on", Field::Created),
    ("registration date", Field::Created),
    ("registration time", Field::Created),
    ("registry expiry date", Field::Expires),
    ("registrar registration expiration date", Field::Expires),
    ("expiry date", Field::Expires),
    ("expiration date", Field::Expires),
    ("expiration time", Field::Expires),
    ("paid-till", Field::Expires),
    ("domain status", Field::Status),
    ("status", Field::Status),
    ("name server", Field::NameServer),
    ("nameserver", Field::NameServer),
    ("nserver", Field::NameServer),
];

const LABELED_STAR_KEYS: &[(&str, Field)] = &[
    ("organization name", Field::Registrar),
    ("created on", Field::Created),
    ("expires on", Field::Expires),
    ("domain status", Field::Status),
];

const NOMINET_KEYS: &[(&str, Field)] = &[
    ("registrar", Field::Registrar),
    ("registered on", Field::Created),
    ("expiry date", Field::Expires),
    ("registration status", Field::Status),
    ("name servers", Field::NameServer),
];

/// Raw field values pulled from a reply, before date normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub registrar: Option<String>,
    pub creation_date: Option<String>,
    pub expiration_date: Option<String>,
    pub status: Option<String>,
    pub name_servers: Vec<String>,
}

impl ExtractedFields {
    /// Store a value. Scalars keep their first value; name servers are
    /// lowercased, stripped of trailing dots and deduplicated.
    fn set(&mut self, field: Field, value: &str) {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("n/a") || value.contains("REDACTED") {
            return;
        }

        let slot = match field {
            Field::Registrar => &mut self.registrar,
            Field::Created => &mut self.creation_date,
            Field::Expires => &mut self.expiration_date,
            Field::Status => &mut self.status,
            Field::NameServer => {
                let host = first_token(value).trim_end_matches('.').to_lowercase();
                if host.contains('.') && !self.name_servers.contains(&host) {
                    self.name_servers.push(host);
                }
                return;
            }
        };
        if slot.is_none() {
            *slot = Some(value.to_string());
        }
    }
}

impl ReplyFormat {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ReplyFormat::LabeledStar => "labeled-star",
            ReplyFormat::Nominet => "nominet",
            ReplyFormat::Generic => "generic",
        }
    }

    /// Whether `raw` follows this convention.
    pub fn detect(&self, raw: &str) -> bool {
        match self {
            ReplyFormat::LabeledStar => {
                raw.contains("** Domain Name:") && raw.contains("** Registrar:")
            }
            ReplyFormat::Nominet => raw.contains("Domain name:") && raw.contains("Nominet"),
            ReplyFormat::Generic => true,
        }
    }

    /// Pull field values out of `raw` according to this convention.
    pub fn extract(&self, raw: &str) -> ExtractedFields {
        match self {
            ReplyFormat::LabeledStar => extract_labeled_star(raw),
            ReplyFormat::Nominet => extract_nominet(raw),
            ReplyFormat::Generic => extract_generic(raw),
        }
    }
}

/// Pick the first format whose predicate holds.
pub fn detect_format(raw: &str) -> ReplyFormat {
    FORMATS
        .iter()
        .copied()
        .find(|format| format.detect(raw))
        .unwrap_or(ReplyFormat::Generic)
}

fn lookup_key(table: &[(&str, Field)], key: &str) -> Option<Field> {
    table
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, field)| *field)
}

fn first_token(value: &str) -> &str {
    value.split_whitespace().next().unwrap_or("")
}

/// Split `Key: value`, lowercasing the key and dropping dot leaders
/// (`Created on......: x` has key `created on`).
fn split_key_value(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim().trim_end_matches('.').trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

fn extract_generic(raw: &str) -> ExtractedFields {
    let mut fields = ExtractedFields::default();

    for line in raw.lines() {
        let (key, value) = match split_key_value(line) {
            Some(pair) => pair,
            None => continue,
        };
        match lookup_key(GENERIC_KEYS, &key) {
            Some(Field::Registrar) => {
                let name = value.split('(').next().unwrap_or("");
                fields.set(Field::Registrar, name);
            }
            Some(Field::Status) => fields.set(Field::Status, first_token(value)),
            Some(field) => fields.set(field, value),
            None => {}
        }
    }

    fields
}

fn extract_labeled_star(raw: &str) -> ExtractedFields {
    let mut fields = ExtractedFields::default();
    let mut in_servers = false;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(header) = trimmed.strip_prefix("**") {
            in_servers = header.trim().to_lowercase().starts_with("domain servers");
            // The domain name header carries a value but no field we keep.
            continue;
        }

        if in_servers {
            fields.set(Field::NameServer, trimmed);
            continue;
        }

        if let Some((key, value)) = split_key_value(trimmed) {
            if let Some(field) = lookup_key(LABELED_STAR_KEYS, &key) {
                fields.set(field, value);
            }
        }
    }

    fields
}

fn extract_nominet(raw: &str) -> ExtractedFields {
    let mut fields = ExtractedFields::default();
    // Header whose values continue on the following indented lines.
    let mut section: Option<Field> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            section = None;
            continue;
        }

        if let Some((key, value)) = split_key_value(trimmed) {
            let known = lookup_key(NOMINET_KEYS, &key);
            if value.is_empty() {
                section = known;
                continue;
            }
            if let Some(field) = known {
                set_nominet(&mut fields, field, value);
                continue;
            }
        }

        if trimmed.contains("WHOIS lookup") {
            continue;
        }
        if let Some(field) = section {
            set_nominet(&mut fields, field, trimmed);
        }
    }

    fields
}

fn set_nominet(fields: &mut ExtractedFields, field: Field, value: &str) {
    match field {
        Field::Registrar => {
            let name = value.split('[').next().unwrap_or("");
            fields.set(Field::Registrar, name);
        }
        other => fields.set(other, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_order() {
        let star = "** Domain Name: ornek.com.tr\n** Registrar:\nOrganization Name : X\n";
        assert_eq!(detect_format(star), ReplyFormat::LabeledStar);

        let nominet = "    Domain name:\n        example.co.uk\n    Registrar:\n        Nominet UK [Tag = X]\n";
        assert_eq!(detect_format(nominet), ReplyFormat::Nominet);

        assert_eq!(detect_format("Domain Name: EXAMPLE.COM\n"), ReplyFormat::Generic);
        assert_eq!(detect_format(""), ReplyFormat::Generic);
    }

    #[test]
    fn test_generic_first_scalar_wins() {
        let raw = "Registrar: First Registrar (IANA 1)\nRegistrar: Second\nCreated: 2001-01-01\nCreation Date: 1999-01-01\n";
        let fields = ReplyFormat::Generic.extract(raw);
        assert_eq!(fields.registrar.as_deref(), Some("First Registrar"));
        assert_eq!(fields.creation_date.as_deref(), Some("2001-01-01"));
    }

    #[test]
    fn test_generic_skips_redacted_and_na() {
        let raw = "Registrar: REDACTED FOR PRIVACY\nDomain Status: N/A\nRegistrar: Real Registrar\n";
        let fields = ReplyFormat::Generic.extract(raw);
        assert_eq!(fields.registrar.as_deref(), Some("Real Registrar"));
        assert_eq!(fields.status, None);
    }

    #[test]
    fn test_generic_keeps_colons_in_values() {
        let raw = "Registry Expiry Date: 2027-08-13T04:00:00Z\n";
        let fields = ReplyFormat::Generic.extract(raw);
        assert_eq!(
            fields.expiration_date.as_deref(),
            Some("2027-08-13T04:00:00Z")
        );
    }

    #[test]
    fn test_generic_name_servers_normalized() {
        let raw = "Name Server: NS1.EXAMPLE.COM\nnserver: ns1.example.com.\nName Server: ns2.example.com 192.0.2.1\nName Server: \n";
        let fields = ReplyFormat::Generic.extract(raw);
        assert_eq!(fields.name_servers, vec!["ns1.example.com", "ns2.example.com"]);
    }

    #[test]
    fn test_nominet_values_on_following_lines() {
        let raw = "    Registrar:\n        Example Registrar Ltd [Tag = EXAMPLE]\n        URL: https://example.net\n\n    Registration status:\n        Registered until expiry date.\n";
        let fields = ReplyFormat::Nominet.extract(raw);
        assert_eq!(fields.registrar.as_deref(), Some("Example Registrar Ltd"));
        assert_eq!(
            fields.status.as_deref(),
            Some("Registered until expiry date.")
        );
    }
}
