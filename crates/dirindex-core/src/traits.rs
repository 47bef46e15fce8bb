//! Host framework interface boundary
//!
//! The crawl engine never owns a main loop: the host scheduler calls into it
//! and consumes its output through these traits.

use async_trait::async_trait;

use crate::docid::DocId;
use crate::error::CrawlResult;
use crate::status::Status;

/// Sink accepting batches of document identifiers discovered by a full scan.
#[async_trait]
pub trait DocIdSink: Send + Sync {
    /// Push one batch of document ids downstream.
    async fn push_doc_ids(&self, ids: Vec<DocId>) -> CrawlResult<()>;
}

/// Decoding capability for credentials stored in encoded form.
pub trait SensitiveValueDecoder: Send + Sync {
    /// Decode an encoded credential into its cleartext value.
    fn decode(&self, encoded: &str) -> CrawlResult<String>;
}

/// Pass-through decoder for deployments storing credentials in cleartext.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextDecoder;

impl SensitiveValueDecoder for PlaintextDecoder {
    fn decode(&self, encoded: &str) -> CrawlResult<String> {
        Ok(encoded.to_string())
    }
}

/// Source of a ranked status for operational dashboards.
pub trait StatusSource: Send + Sync {
    /// Dashboard label for this source.
    fn name(&self) -> String;

    /// Current status of this source.
    fn retrieve_status(&self) -> Status;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Sink recording every pushed batch, for use in engine tests.
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<DocId>>>,
    }

    #[async_trait]
    impl DocIdSink for RecordingSink {
        async fn push_doc_ids(&self, ids: Vec<DocId>) -> CrawlResult<()> {
            self.batches.lock().unwrap().push(ids);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sink_receives_batches() {
        let sink = RecordingSink::default();
        sink.push_doc_ids(vec![DocId::new(0, "cn=a,dc=b")])
            .await
            .unwrap();
        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].as_str(), "server=0/cn=a,dc=b");
    }

    #[test]
    fn test_plaintext_decoder_is_identity() {
        let decoder = PlaintextDecoder;
        assert_eq!(decoder.decode("secret").unwrap(), "secret");
    }
}
