use anyhow::Result;
use tracing_subscriber::EnvFilter;

use askmyrace::ingest::Ingestor;
use askmyrace::openai::OpenAiClient;
use askmyrace::registry::DocumentRegistry;
use askmyrace::{run_server, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    if config.openai_api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; upload and ask calls will fail");
    }

    let openai = OpenAiClient::new(config.openai_base_url.clone(), config.openai_api_key.clone());
    let registry = DocumentRegistry::shared();
    let ingestor = Ingestor::new(config.clone(), openai.clone(), registry.clone());

    run_server(config, openai, registry, ingestor).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
