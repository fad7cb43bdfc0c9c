//! Client address allow-list
//!
//! Patterns come in three shapes:
//! - exact addresses (`127.0.0.1`, `::1`)
//! - wildcard globs where `*` matches any run of characters (`172.31.*`)
//! - CIDR blocks for either family (`10.0.0.0/8`, `2001:db8::/32`)
//!
//! Matching is pure and fails closed: anything that does not parse, or
//! mixes address families, matches nothing.

use regex::Regex;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Reasons a configured pattern is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    #[error("invalid CIDR network address: {0}")]
    InvalidNetwork(String),

    #[error("invalid CIDR prefix length: {0}")]
    InvalidPrefix(String),

    #[error("prefix length /{prefix} exceeds {max} bits")]
    PrefixTooLong { prefix: u32, max: u32 },

    #[error("invalid wildcard {pattern}: {reason}")]
    InvalidWildcard { pattern: String, reason: String },
}

/// One allow-list entry
#[derive(Debug, Clone)]
pub enum AllowListPattern {
    /// Normalized address text
    Exact(String),
    /// Glob compiled to an anchored regex
    Wildcard { glob: String, regex: Regex },
    /// Network plus prefix length; the family is fixed by `network`
    Cidr { network: IpAddr, prefix_len: u32 },
}

impl AllowListPattern {
    /// Parse a configured pattern.
    ///
    /// A `*` makes it a wildcard, otherwise a `/` makes it CIDR, otherwise
    /// it is an exact address.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        if pattern.contains('*') {
            return Self::wildcard(pattern);
        }

        if let Some((network, prefix)) = pattern.split_once('/') {
            let network: IpAddr = network
                .trim()
                .parse()
                .map_err(|_| PatternError::InvalidNetwork(network.to_string()))?;
            let prefix_len: u32 = prefix
                .trim()
                .parse()
                .map_err(|_| PatternError::InvalidPrefix(prefix.to_string()))?;

            let max = address_bits(&network);
            if prefix_len > max {
                return Err(PatternError::PrefixTooLong {
                    prefix: prefix_len,
                    max,
                });
            }

            return Ok(Self::Cidr {
                network,
                prefix_len,
            });
        }

        Ok(Self::Exact(normalize(pattern)))
    }

    fn wildcard(glob: &str) -> Result<Self, PatternError> {
        let body = glob
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        let regex = Regex::new(&format!("^{}$", body)).map_err(|e| PatternError::InvalidWildcard {
            pattern: glob.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self::Wildcard {
            glob: glob.to_string(),
            regex,
        })
    }

    /// Does `address` satisfy this pattern
    pub fn matches(&self, address: &str) -> bool {
        match self {
            Self::Exact(expected) => normalize(address) == *expected,
            Self::Wildcard { regex, .. } => regex.is_match(&normalize(address)),
            Self::Cidr {
                network,
                prefix_len,
            } => cidr_contains(address, network, *prefix_len),
        }
    }
}

impl std::fmt::Display for AllowListPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(address) => write!(f, "{}", address),
            Self::Wildcard { glob, .. } => write!(f, "{}", glob),
            Self::Cidr {
                network,
                prefix_len,
            } => write!(f, "{}/{}", network, prefix_len),
        }
    }
}

/// True iff `address` satisfies at least one pattern
pub fn matches(address: &str, patterns: &[AllowListPattern]) -> bool {
    patterns.iter().any(|pattern| pattern.matches(address))
}

/// Byte-wise CIDR membership.
///
/// Builds a mask of `prefix_len` leading one bits over the family's byte
/// length and compares the masked address against the masked network.
pub fn cidr_contains(address: &str, network: &IpAddr, prefix_len: u32) -> bool {
    let Ok(address) = address.trim().parse::<IpAddr>() else {
        return false;
    };

    let address_bytes = octets(&address);
    let network_bytes = octets(network);
    if address_bytes.len() != network_bytes.len() {
        return false;
    }
    if prefix_len > address_bits(network) {
        return false;
    }

    let mask = prefix_mask(address_bytes.len(), prefix_len);
    address_bytes
        .iter()
        .zip(&network_bytes)
        .zip(&mask)
        .all(|((a, n), m)| a & m == n & m)
}

fn prefix_mask(len: usize, prefix_len: u32) -> Vec<u8> {
    let full_bytes = (prefix_len / 8) as usize;
    let remainder = prefix_len % 8;

    let mut mask = vec![0xFF; full_bytes];
    if remainder > 0 {
        mask.push(0xFFu8 << (8 - remainder));
    }
    mask.resize(len, 0x00);
    mask
}

fn octets(address: &IpAddr) -> Vec<u8> {
    match address {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

fn address_bits(address: &IpAddr) -> u32 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Canonical text for addresses, trimmed text for anything else
fn normalize(address: &str) -> String {
    let trimmed = address.trim();
    match trimmed.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Parsed allow-list
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    patterns: Vec<AllowListPattern>,
}

impl AllowList {
    /// Parse configured patterns, dropping (and logging) any that are
    /// malformed. A dropped entry admits nobody.
    pub fn parse<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .filter_map(|raw| match AllowListPattern::parse(raw.as_ref()) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = raw.as_ref(), error = %e, "Ignoring invalid allow-list pattern");
                    None
                }
            })
            .collect();

        Self { patterns }
    }

    pub fn permits(&self, address: &str) -> bool {
        let allowed = matches(address, &self.patterns);
        if !allowed {
            debug!(address, patterns = self.patterns.len(), "Address not in allow-list");
        }
        allowed
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
