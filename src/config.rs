use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub examples_dir: PathBuf,
    pub openai_base_url: String,
    pub openai_api_key: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub top_k: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("ASK_MY_RACE_BIND").unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
            examples_dir: env::var("ASK_MY_RACE_EXAMPLES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./race_examples")),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            chat_model: env::var("ASK_MY_RACE_CHAT_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            embedding_model: env::var("ASK_MY_RACE_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            top_k: env::var("ASK_MY_RACE_TOP_K")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }
}
