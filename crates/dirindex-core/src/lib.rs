//! # dirindex framework
//!
//! Core abstractions shared by dirindex directory sources.
//!
//! The crawl engine turns directory entries into indexable documents for a
//! downstream search index. This crate carries the pieces that do not depend
//! on any particular directory protocol:
//!
//! - [`error`] — error types with transient/permanent classification
//! - [`status`] — severity-ranked validation status and aggregation
//! - [`docid`] — the `server=<index>/<dn>` document identifier codec
//! - [`traits`] — the interface boundary to the host crawl scheduler
//!
//! The engine is host-driven: the scheduling framework calls `initialize`,
//! `scan_all`, and `fetch_one` on a source and consumes document ids and
//! statuses through the [`traits`] here. The engine never owns a main loop.

pub mod docid;
pub mod error;
pub mod status;
pub mod traits;

/// Prelude module for convenient imports.
///
/// ```
/// use dirindex_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::docid::{DocId, ParsedDocId};
    pub use crate::error::{CrawlError, CrawlResult};
    pub use crate::status::{aggregate, Status, StatusCode};
    pub use crate::traits::{DocIdSink, PlaintextDecoder, SensitiveValueDecoder, StatusSource};
}

// Re-export async_trait for sink implementors
pub use async_trait::async_trait;
