//! Crawl engine error types
//!
//! Error definitions with transient/permanent classification so the host
//! scheduler can decide between retrying a crawl cycle and aborting startup.

use thiserror::Error;

/// Error that can occur while crawling a directory source.
#[derive(Debug, Error)]
pub enum CrawlError {
    // Connectivity errors (transient)
    /// Failed to establish or keep a connection to the directory server.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A directory operation exceeded the configured read timeout.
    #[error("read timed out: {message}")]
    ReadTimeout { message: String },

    /// One or more servers failed during a full crawl; raised only after
    /// every configured server has been attempted.
    #[error("could not get entities from the following server(s): {hosts}")]
    ScanFailed {
        hosts: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Authentication errors (permanent, abort startup)
    /// The directory rejected the bind credentials.
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    // Configuration errors (permanent)
    /// A required field is missing or a value is malformed.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A document identifier was not produced by this crawler.
    #[error("invalid document id: {id}")]
    InvalidDocId { id: String },

    // Integrity errors (permanent, signal a deployment bug)
    /// A DN-scoped fetch matched more than one entry.
    #[error("more than one entry found at {dn}: {count} results")]
    AmbiguousResult { dn: String, count: usize },

    /// A search result row could not be turned into an entity.
    #[error("malformed directory record: {message}")]
    MalformedRecord { message: String },
}

impl CrawlError {
    /// Check if this error is transient and the operation may be retried
    /// on a later crawl cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CrawlError::ConnectionFailed { .. }
                | CrawlError::ReadTimeout { .. }
                | CrawlError::ScanFailed { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            CrawlError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            CrawlError::ReadTimeout { .. } => "READ_TIMEOUT",
            CrawlError::ScanFailed { .. } => "SCAN_FAILED",
            CrawlError::AuthenticationFailed => "AUTH_FAILED",
            CrawlError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            CrawlError::InvalidDocId { .. } => "INVALID_DOC_ID",
            CrawlError::AmbiguousResult { .. } => "AMBIGUOUS_RESULT",
            CrawlError::MalformedRecord { .. } => "MALFORMED_RECORD",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        CrawlError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        CrawlError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        CrawlError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a read timeout error.
    pub fn read_timeout(message: impl Into<String>) -> Self {
        CrawlError::ReadTimeout {
            message: message.into(),
        }
    }

    /// Create a malformed record error.
    pub fn malformed_record(message: impl Into<String>) -> Self {
        CrawlError::MalformedRecord {
            message: message.into(),
        }
    }

    /// Create a scan summary error naming every failed host.
    pub fn scan_failed(
        hosts: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        CrawlError::ScanFailed {
            hosts: hosts.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for crawl operations.
pub type CrawlResult<T> = Result<T, CrawlError>;
