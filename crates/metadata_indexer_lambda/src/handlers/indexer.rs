use metadata_indexer_core::indexer::{Clock, IndexFailure, MetadataIndexer, MetadataStore};
use serde::Serialize;
use serde_json::Value;

pub const SUCCESS_MESSAGE: &str = "Metadata Indexing Successful";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// JSON-encoded message, so the body is a quoted string.
    pub body: String,
}

impl IndexerResponse {
    pub fn success() -> Self {
        Self {
            status_code: 200,
            body: Value::String(SUCCESS_MESSAGE.to_string()).to_string(),
        }
    }
}

/// Indexes one invocation payload. Any failure is returned as an error so the
/// invocation fails and the event is redelivered or dead-lettered; no partial
/// success is ever reported as success.
pub fn handle_indexer_event<S, C>(
    indexer: &MetadataIndexer<S, C>,
    payload: Value,
) -> Result<IndexerResponse, IndexFailure>
where
    S: MetadataStore,
    C: Clock,
{
    let outcome = indexer.index_payload(payload)?;
    tracing::info!(
        records_indexed = outcome.records_indexed,
        "notification batch indexed"
    );
    Ok(IndexerResponse::success())
}
