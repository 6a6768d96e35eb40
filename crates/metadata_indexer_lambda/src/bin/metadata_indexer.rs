use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use metadata_indexer_core::config::IndexerSettings;
use metadata_indexer_core::indexer::MetadataIndexer;
use metadata_indexer_lambda::adapters::dynamodb::DynamoDbMetadataStore;
use metadata_indexer_lambda::handlers::indexer::{handle_indexer_event, IndexerResponse};
use metadata_indexer_lambda::telemetry;
use serde_json::Value;

type Indexer = MetadataIndexer<DynamoDbMetadataStore>;

async fn handle_request(
    event: LambdaEvent<Value>,
    indexer: &Indexer,
) -> Result<IndexerResponse, Error> {
    let request_id = event.context.request_id.clone();
    handle_indexer_event(indexer, event.payload).map_err(|failure| {
        tracing::error!(
            request_id = %request_id,
            retryable = failure.is_retryable(),
            committed = failure.committed,
            error = %failure,
            "indexing failed"
        );
        Error::from(failure)
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init_json("info");

    let settings = IndexerSettings::from_env()?;
    let shared_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let store = DynamoDbMetadataStore::new(
        aws_sdk_dynamodb::Client::new(&shared_config),
        settings.table_name,
    );
    tracing::info!(table = store.table_name(), "metadata indexer ready");
    let indexer = MetadataIndexer::new(store);

    run(service_fn(|event| handle_request(event, &indexer))).await
}
