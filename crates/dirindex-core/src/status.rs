//! Validation status reporting
//!
//! Severity-ranked status values surfaced to operational dashboards, and the
//! aggregation rule that folds per-connection outcomes into a single status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity-ranked status code for attribute validation.
///
/// The derived ordering is the aggregation ranking: a full scan that never
/// completed (`Unavailable`) outranks a template referencing unfetched
/// attributes (`Error`), which outranks a requested attribute never observed
/// (`Warning`). `Inactive` is the baseline for "no connections configured".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum StatusCode {
    /// No directory connections are configured.
    #[default]
    Inactive,
    /// Every requested attribute was observed during the last full scan.
    Normal,
    /// At least one requested attribute was never observed.
    Warning,
    /// The display template references an attribute that is not fetched.
    Error,
    /// A full scan has not yet completed; validation is still in progress.
    Unavailable,
}

impl StatusCode {
    /// Get the string representation used on dashboards.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Inactive => "inactive",
            StatusCode::Normal => "normal",
            StatusCode::Warning => "warning",
            StatusCode::Error => "error",
            StatusCode::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A status code paired with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Severity of this status.
    pub code: StatusCode,
    /// Human-readable explanation, shown on the dashboard.
    pub message: String,
}

impl Status {
    /// Create a new status.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The fixed status for a deployment with no connections configured.
    #[must_use]
    pub fn inactive() -> Self {
        Self::new(StatusCode::Inactive, "no directory connections configured")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Fold per-connection statuses into one aggregate.
///
/// The aggregate keeps the worst code seen (per the [`StatusCode`] ordering)
/// and concatenates every non-empty message in connection order, separated by
/// commas. An empty input yields the fixed [`Status::inactive`] result.
pub fn aggregate<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    let mut iter = statuses.into_iter().peekable();
    if iter.peek().is_none() {
        return Status::inactive();
    }

    let mut code = StatusCode::Inactive;
    let mut message = String::new();
    for status in iter {
        if status.code > code {
            code = status.code;
        }
        if !status.message.is_empty() {
            if !message.is_empty() {
                message.push_str(", ");
            }
            message.push_str(&status.message);
        }
    }
    Status { code, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_ranking() {
        assert!(StatusCode::Unavailable > StatusCode::Error);
        assert!(StatusCode::Error > StatusCode::Warning);
        assert!(StatusCode::Warning > StatusCode::Normal);
        assert!(StatusCode::Normal > StatusCode::Inactive);
    }

    #[test]
    fn test_aggregate_empty() {
        let status = aggregate(std::iter::empty());
        assert_eq!(status.code, StatusCode::Inactive);
        assert_eq!(status.message, "no directory connections configured");
    }

    #[test]
    fn test_aggregate_keeps_worst_code_and_all_messages() {
        let status = aggregate(vec![
            Status::new(StatusCode::Warning, "host1: attr1, attr2 missing"),
            Status::new(StatusCode::Error, "host2: attr3 not fetched"),
        ]);
        assert_eq!(status.code, StatusCode::Error);
        assert_eq!(
            status.message,
            "host1: attr1, attr2 missing, host2: attr3 not fetched"
        );
    }

    #[test]
    fn test_aggregate_preserves_connection_order() {
        let status = aggregate(vec![
            Status::new(StatusCode::Error, "first"),
            Status::new(StatusCode::Warning, "second"),
        ]);
        assert_eq!(status.code, StatusCode::Error);
        assert_eq!(status.message, "first, second");
    }

    #[test]
    fn test_aggregate_unavailable_outranks_error() {
        let status = aggregate(vec![
            Status::new(StatusCode::Error, "bad template"),
            Status::new(StatusCode::Unavailable, "still validating"),
        ]);
        assert_eq!(status.code, StatusCode::Unavailable);
    }

    #[test]
    fn test_aggregate_skips_empty_messages() {
        let status = aggregate(vec![
            Status::new(StatusCode::Normal, ""),
            Status::new(StatusCode::Normal, "all attributes found"),
        ]);
        assert_eq!(status.code, StatusCode::Normal);
        assert_eq!(status.message, "all attributes found");
    }

    #[test]
    fn test_status_serialization() {
        let status = Status::new(StatusCode::Warning, "attr1 missing");
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"warning\""));
        let parsed: Status = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }
}
