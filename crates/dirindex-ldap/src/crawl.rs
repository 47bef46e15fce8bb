//! Crawl orchestration across configured connections
//!
//! The orchestrator fans a full crawl out over every configured server,
//! routes per-document fetches by document id, and folds per-connection
//! validation statuses into one dashboard status. All directory logic
//! lives in [`LdapCrawler`]; this layer only maps between document ids
//! and connections.

use std::collections::BTreeMap;

use tracing::{error, info, instrument};

use dirindex_core::docid::DocId;
use dirindex_core::error::{CrawlError, CrawlResult};
use dirindex_core::status::{aggregate, Status};
use dirindex_core::traits::{DocIdSink, SensitiveValueDecoder, StatusSource};

use crate::client::LdapCrawler;
use crate::config::LdapServerConfig;
use crate::entry::DirectoryEntity;

/// Content type of every rendered document.
const CONTENT_TYPE: &str = "text/html; charset=UTF-8";

/// An indexable document produced from one directory entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Every attribute of the entity, valueless attributes as "null".
    pub metadata: BTreeMap<String, String>,
    /// MIME type of the body.
    pub content_type: String,
    /// Rendered display template, HTML-escaped.
    pub body: Vec<u8>,
}

/// Orchestrates crawling over every configured directory connection.
pub struct CrawlOrchestrator {
    crawlers: Vec<LdapCrawler>,
}

impl CrawlOrchestrator {
    /// Build one crawler per configuration. Fails on the first invalid
    /// configuration or undecodable credential.
    pub fn new(
        configs: Vec<LdapServerConfig>,
        decoder: &dyn SensitiveValueDecoder,
    ) -> CrawlResult<Self> {
        let crawlers = configs
            .into_iter()
            .map(|config| LdapCrawler::new(config, decoder))
            .collect::<CrawlResult<Vec<_>>>()?;
        Ok(Self { crawlers })
    }

    /// Number of configured connections.
    #[must_use]
    pub fn server_count(&self) -> usize {
        self.crawlers.len()
    }

    /// Connect and bind every configured server. Any failure, including
    /// bad credentials, aborts startup.
    #[instrument(skip(self))]
    pub async fn initialize(&mut self) -> CrawlResult<()> {
        for crawler in &mut self.crawlers {
            crawler.initialize().await?;
        }
        info!(servers = self.crawlers.len(), "all directory connections initialized");
        Ok(())
    }

    /// Run a full crawl of every server and push the discovered document
    /// ids to the sink, one batch per server.
    ///
    /// Every server is attempted even when an earlier one fails; after
    /// the last attempt a single error names all failed hosts so the
    /// host scheduler retries the whole cycle.
    #[instrument(skip(self, sink))]
    pub async fn push_all_doc_ids(&mut self, sink: &dyn DocIdSink) -> CrawlResult<()> {
        let mut bad_hosts = Vec::new();
        let mut first_cause: Option<CrawlError> = None;
        for (index, crawler) in self.crawlers.iter_mut().enumerate() {
            match crawler.scan_all().await {
                Ok(entities) => {
                    let ids = entities
                        .iter()
                        .map(|e| DocId::new(index, e.dn()))
                        .collect();
                    sink.push_doc_ids(ids).await?;
                }
                Err(err) => {
                    error!(host = crawler.host_name(), error = %err, "full scan failed");
                    bad_hosts.push(crawler.host_name().to_string());
                    first_cause.get_or_insert(err);
                }
            }
        }
        match first_cause {
            None => Ok(()),
            Some(cause) => Err(CrawlError::scan_failed(bad_hosts.join(","), cause)),
        }
    }

    /// Fetch the current document for an identifier, or None when the
    /// underlying entry no longer exists.
    pub async fn fetch_document(&mut self, id: &DocId) -> CrawlResult<Option<Document>> {
        let parsed = id.parse(self.crawlers.len())?;
        let crawler = &mut self.crawlers[parsed.server];
        let template = crawler.display_template();
        match crawler.fetch_one(&parsed.dn).await? {
            None => Ok(None),
            Some(entity) => build_document(&entity, &template).map(Some),
        }
    }
}

impl StatusSource for CrawlOrchestrator {
    fn name(&self) -> String {
        "directory crawl".to_string()
    }

    fn retrieve_status(&self) -> Status {
        aggregate(self.crawlers.iter().map(StatusSource::retrieve_status))
    }
}

/// Render one entity into an indexable document.
fn build_document(entity: &DirectoryEntity, template: &str) -> CrawlResult<Document> {
    Ok(Document {
        metadata: entity.as_metadata(),
        content_type: CONTENT_TYPE.to_string(),
        body: entity.render_document(template)?.into_bytes(),
    })
}
