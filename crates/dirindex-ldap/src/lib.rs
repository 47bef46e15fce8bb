//! # dirindex LDAP source
//!
//! Directory crawl engine for LDAP and Active Directory servers. The
//! engine discovers entities under a configured base DN with paged
//! subtree searches, assigns each a stable `server=<index>/<dn>`
//! document id, and renders entities into HTML-escaped documents via a
//! configurable display template.
//!
//! The host scheduling framework drives the engine through
//! [`CrawlOrchestrator`]: `initialize` at startup, `push_all_doc_ids`
//! for full crawl cycles, `fetch_document` for per-document retrieval,
//! and `retrieve_status` for the operational dashboard.
//!
//! ## Example
//!
//! ```no_run
//! use dirindex_core::traits::PlaintextDecoder;
//! use dirindex_ldap::{CrawlOrchestrator, LdapServerConfig};
//!
//! # async fn run(configs: Vec<LdapServerConfig>) -> dirindex_core::error::CrawlResult<()> {
//! let mut orchestrator = CrawlOrchestrator::new(configs, &PlaintextDecoder)?;
//! orchestrator.initialize().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod crawl;
pub mod entry;

pub use client::LdapCrawler;
pub use config::{ConnectMethod, LdapServerConfig};
pub use crawl::{CrawlOrchestrator, Document};
pub use entry::DirectoryEntity;
