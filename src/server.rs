use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use walkdir::WalkDir;

use crate::config::AppConfig;
use crate::guard;
use crate::ingest::{IngestError, Ingestor};
use crate::models::{AskRequest, AskResponse, Citation, ExampleGuide, UploadResponse};
use crate::openai::OpenAiClient;
use crate::qa;
use crate::registry::SharedRegistry;

const UPLOADS_PER_MINUTE: usize = 5;
const ASKS_PER_MINUTE: usize = 30;

// request body ceiling: the PDF limit plus multipart framing headroom
const MAX_BODY_BYTES: usize = guard::MAX_PDF_SIZE_BYTES as usize + 1024 * 1024;

#[derive(Clone)]
struct AppState {
    config: AppConfig,
    openai: OpenAiClient,
    registry: SharedRegistry,
    ingestor: Ingestor,
    upload_limiter: Arc<Mutex<RateLimiter>>,
    ask_limiter: Arc<Mutex<RateLimiter>>,
}

pub async fn run_server(
    config: AppConfig,
    openai: OpenAiClient,
    registry: SharedRegistry,
    ingestor: Ingestor,
) -> Result<()> {
    let state = AppState {
        config: config.clone(),
        openai,
        registry,
        ingestor,
        upload_limiter: Arc::new(Mutex::new(RateLimiter::new(
            UPLOADS_PER_MINUTE,
            Duration::from_secs(60),
        ))),
        ask_limiter: Arc::new(Mutex::new(RateLimiter::new(
            ASKS_PER_MINUTE,
            Duration::from_secs(60),
        ))),
    };

    let app = Router::new()
        .route("/upload", post(upload_pdf))
        .route("/ask", post(ask_question))
        .route("/examples", get(get_examples))
        .route("/examples/:slug", post(load_example))
        .route("/health", get(healthcheck))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn upload_pdf(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    require_rate_limit(
        &state.upload_limiter,
        &headers,
        "Too many uploads from this IP. Try again later.",
    )?;

    let mut upload: Option<(Option<String>, Option<String>, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(err.to_string()))?;
        upload = Some((filename, content_type, bytes.to_vec()));
        break;
    }

    let Some((filename, content_type, bytes)) = upload else {
        return Err(ApiError::bad_request("A PDF file field is required."));
    };
    let filename = filename.unwrap_or_default();

    guard::validate_pdf_upload(content_type.as_deref(), &filename, bytes.len() as u64)
        .map_err(|rejection| ApiError::bad_request(rejection.message()))?;

    let response = state.ingestor.ingest_pdf(bytes, &filename).await?;
    Ok(Json(response))
}

async fn ask_question(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    require_rate_limit(
        &state.ask_limiter,
        &headers,
        "Too many questions from this IP. Please slow down.",
    )?;

    guard::validate_question(&payload.question)
        .map_err(|rejection| ApiError::bad_request(rejection.message()))?;
    let question = collapse_whitespace(payload.question.trim());

    let context = payload
        .context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(collapse_whitespace);
    if let Some(context) = context.as_deref() {
        if context.chars().count() > guard::MAX_CONTEXT_CHARS {
            return Err(ApiError::bad_request(
                "Conversation context is too long (1500 character limit).",
            ));
        }
        if guard::matches_banned_pattern(context) {
            return Err(ApiError::bad_request(
                guard::QuestionRejection::NotAllowed.message(),
            ));
        }
    }

    {
        let registry = state.registry.read().await;
        if registry.get(&payload.document_id).is_none() {
            return Err(ApiError::not_found(format!(
                "Document {} not found",
                payload.document_id
            )));
        }
    }

    let combined_query = match context.as_deref() {
        Some(context) => format!("{question}\n\nPrevious conversation context:\n{context}"),
        None => question.clone(),
    };
    let query_embedding = state
        .openai
        .embed_query(&state.config.embedding_model, &combined_query)
        .await?;

    // clone the light fields out so the registry lock is not held across the
    // chat completion call
    let retrieved: Vec<qa::ContextChunk> = {
        let registry = state.registry.read().await;
        let entry = registry.get(&payload.document_id).ok_or_else(|| {
            ApiError::not_found(format!("Document {} not found", payload.document_id))
        })?;
        entry
            .similarity_search(&query_embedding, state.config.top_k)
            .into_iter()
            .map(|chunk| qa::ContextChunk {
                section: chunk.section.clone(),
                page: chunk.page,
                text: chunk.text.clone(),
            })
            .collect()
    };

    let answer = qa::answer_question(
        &state.openai,
        &state.config.chat_model,
        &question,
        context.as_deref(),
        &retrieved,
    )
    .await?;

    let citations = retrieved
        .iter()
        .map(|chunk| Citation {
            section: chunk.section.clone(),
            page: chunk.page,
            excerpt: Some(qa::excerpt(&chunk.text)),
        })
        .collect();

    Ok(Json(AskResponse { answer, citations }))
}

async fn get_examples(State(state): State<AppState>) -> Result<Json<Vec<ExampleGuide>>, ApiError> {
    Ok(Json(list_example_guides(&state.config.examples_dir)))
}

async fn load_example(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<UploadResponse>, ApiError> {
    for guide in list_example_guides(&state.config.examples_dir) {
        if guide.slug != slug {
            continue;
        }
        let path = state.config.examples_dir.join(&guide.filename);
        let bytes = tokio::fs::read(&path).await.map_err(|err| {
            tracing::error!(path = %path.display(), error = %err, "failed reading example guide");
            ApiError::internal("Example guide could not be read.")
        })?;
        let response = state.ingestor.ingest_pdf(bytes, &guide.filename).await?;
        return Ok(Json(response));
    }

    Err(ApiError::not_found("Example guide not found."))
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Lists bundled example guides from the configured directory, sorted by
/// filename.
pub fn list_example_guides(dir: &FsPath) -> Vec<ExampleGuide> {
    let mut guides: Vec<ExampleGuide> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let filename = entry.file_name().to_str()?.to_string();
            let stem = filename.strip_suffix(".pdf")?;
            Some(ExampleGuide {
                slug: slugify(stem),
                name: humanize(stem),
                filename,
            })
        })
        .collect();

    guides.sort_by(|a, b| a.filename.cmp(&b.filename));
    guides
}

pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut previous_dash = false;
    for c in value.to_ascii_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            previous_dash = false;
        } else if !previous_dash && !slug.is_empty() {
            slug.push('-');
            previous_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        value.to_ascii_lowercase()
    } else {
        slug
    }
}

pub fn humanize(value: &str) -> String {
    value
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sliding-window request counter keyed by client identity.
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    records: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            records: HashMap::new(),
        }
    }

    pub fn check(&mut self, key: &str) -> bool {
        let now = Instant::now();
        let queue = self.records.entry(key.to_string()).or_default();
        while let Some(front) = queue.front() {
            if now.duration_since(*front) >= self.window {
                queue.pop_front();
            } else {
                break;
            }
        }
        if queue.len() >= self.limit {
            return false;
        }
        queue.push_back(now);
        true
    }
}

fn require_rate_limit(
    limiter: &Mutex<RateLimiter>,
    headers: &HeaderMap,
    message: &str,
) -> Result<(), ApiError> {
    let key = client_key(headers);
    let allowed = limiter
        .lock()
        .map_err(|_| ApiError::internal("rate limiter lock poisoned"))?
        .check(&key);
    if allowed {
        Ok(())
    } else {
        Err(ApiError::too_many_requests(message))
    }
}

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn too_many_requests(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        tracing::error!(error = %value, "request failed");
        Self::internal(value.to_string())
    }
}

impl From<IngestError> for ApiError {
    fn from(value: IngestError) -> Self {
        match value {
            IngestError::Rejected(message) => Self::bad_request(message),
            IngestError::Failed(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "detail": self.message });
        (self.status, Json(body)).into_response()
    }
}
