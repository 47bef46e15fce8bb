//! Document identifier codec
//!
//! A document id encodes which configured server an entity came from plus the
//! entity's DN: `server=<index>/<dn>`. Decoding is strict; anything that does
//! not round-trip to the identical string is an invalid id, not a missing
//! document.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CrawlError, CrawlResult};

/// Marker every document id starts with.
const MARKER: &str = "server=";

/// Opaque identifier for one indexed directory entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

/// The pieces individually extracted from a [`DocId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocId {
    /// Index of the server in the configured connection list.
    pub server: usize,
    /// Distinguished name of the entity on that server.
    pub dn: String,
}

impl DocId {
    /// Encode a server index and DN into a document id.
    pub fn new(server: usize, dn: &str) -> Self {
        DocId(format!("{MARKER}{server}/{dn}"))
    }

    /// Wrap an identifier received from the host framework, unvalidated.
    pub fn from_unique_id(id: impl Into<String>) -> Self {
        DocId(id.into())
    }

    /// Get the identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode this identifier against the configured server count.
    ///
    /// Rejects identifiers that do not start with the marker, carry no `/`
    /// separator, name an out-of-range server, or are not in canonical form
    /// (the decoded parts must re-encode to the identical string).
    pub fn parse(&self, server_count: usize) -> CrawlResult<ParsedDocId> {
        let invalid = || CrawlError::InvalidDocId {
            id: self.0.clone(),
        };

        let rest = self.0.strip_prefix(MARKER).ok_or_else(invalid)?;
        let slash = rest.find('/').ok_or_else(invalid)?;
        let server: usize = rest[..slash].parse().map_err(|_| invalid())?;
        if server >= server_count {
            return Err(invalid());
        }
        let dn = &rest[slash + 1..];

        // Guard against non-canonical spellings such as "server=01/...".
        if DocId::new(server, dn).0 != self.0 {
            return Err(invalid());
        }

        Ok(ParsedDocId {
            server,
            dn: dn.to_string(),
        })
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let id = DocId::new(0, "cn=doe,dc=example,dc=com");
        assert_eq!(id.as_str(), "server=0/cn=doe,dc=example,dc=com");
    }

    #[test]
    fn test_round_trip() {
        let dns = [
            "cn=doe,dc=example,dc=com",
            "cn=a/b,dc=example,dc=com",
            "cn=Smith\\, John,dc=example,dc=com",
            "cn=x//y/z",
        ];
        for (server, dn) in dns.iter().enumerate() {
            let id = DocId::new(server, dn);
            let parsed = id.parse(dns.len()).unwrap();
            assert_eq!(parsed.server, server);
            assert_eq!(parsed.dn, *dn);
        }
    }

    #[test]
    fn test_reject_missing_marker() {
        let id = DocId::from_unique_id("host=0/cn=doe");
        assert!(matches!(id.parse(1), Err(CrawlError::InvalidDocId { .. })));
    }

    #[test]
    fn test_reject_missing_separator() {
        let id = DocId::from_unique_id("server=0");
        assert!(matches!(id.parse(1), Err(CrawlError::InvalidDocId { .. })));
    }

    #[test]
    fn test_reject_out_of_range_index() {
        let id = DocId::from_unique_id("server=2/cn=doe");
        assert!(matches!(id.parse(2), Err(CrawlError::InvalidDocId { .. })));
        assert!(id.parse(3).is_ok());
    }

    #[test]
    fn test_reject_non_numeric_index() {
        let id = DocId::from_unique_id("server=x/cn=doe");
        assert!(matches!(id.parse(1), Err(CrawlError::InvalidDocId { .. })));
        let id = DocId::from_unique_id("server=-1/cn=doe");
        assert!(matches!(id.parse(1), Err(CrawlError::InvalidDocId { .. })));
    }

    #[test]
    fn test_reject_non_canonical_index() {
        let id = DocId::from_unique_id("server=01/cn=doe");
        assert!(matches!(id.parse(2), Err(CrawlError::InvalidDocId { .. })));
    }

    #[test]
    fn test_dn_keeps_embedded_slashes() {
        let id = DocId::from_unique_id("server=1/ou=a/b/c");
        let parsed = id.parse(2).unwrap();
        assert_eq!(parsed.server, 1);
        assert_eq!(parsed.dn, "ou=a/b/c");
    }
}
