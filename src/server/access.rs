//! Origin-based access control.
//!
//! Allowed and favored origins are configured as newline-separated glob
//! lists. `*` is the only wildcard; every other character is literal. Each
//! glob is compiled once into a regular expression anchored at both ends.
//! A wildcard inside the host part cannot cross a `/`, so
//! `https://*.example.com` never matches a string that merely ends with an
//! allowed origin, such as `https://evil.com/https://x.example.com`.

use regex::Regex;
use tracing::{debug, warn};

use crate::error::GatewayError;

// =============================================================================
// Pattern List
// =============================================================================

/// A compiled list of origin globs.
#[derive(Debug, Clone, Default)]
pub struct OriginPatterns {
    patterns: Vec<Regex>,
}

impl OriginPatterns {
    /// Compile a newline-separated glob list. Blank lines are ignored.
    pub fn parse(list: &str) -> Self {
        let patterns = list
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|glob| match glob_to_regex(glob) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = glob, "Ignoring origin pattern: {}", e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// A list that matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether any pattern matches the whole of `value`.
    pub fn matches(&self, value: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(value))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Compile a glob into an anchored regular expression.
///
/// A `*` after the pattern's `://` stays within the authority and never
/// matches `/`. Any other `*` matches any run of characters.
fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let authority_start = glob.find("://").map(|i| i + 3);

    let mut body = String::with_capacity(glob.len() * 2);
    let mut offset = 0;
    for (i, part) in glob.split('*').enumerate() {
        if i > 0 {
            match authority_start {
                Some(start) if offset > start => body.push_str("[^/]*"),
                _ => body.push_str(".*"),
            }
        }
        body.push_str(&regex::escape(part));
        offset += part.len() + 1;
    }

    Regex::new(&format!("^{}$", body))
}

// =============================================================================
// Access Control
// =============================================================================

/// Decides whether a request's Origin may use the gateway.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    allowed: OriginPatterns,
}

impl AccessControl {
    pub fn new(allowed: OriginPatterns) -> Self {
        Self { allowed }
    }

    /// Check an Origin header value.
    ///
    /// A missing Origin is checked as the empty string, so it only passes a
    /// list containing a pattern such as the catch-all `*`.
    pub fn check(&self, origin: Option<&str>) -> Result<(), GatewayError> {
        if self.allowed.matches(origin.unwrap_or("")) {
            Ok(())
        } else {
            debug!(origin = origin.unwrap_or(""), "Origin rejected");
            Err(GatewayError::OriginNotAllowed(
                "Origin not allowed".to_string(),
            ))
        }
    }
}
