use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hope_match::config::Settings;
use hope_match::core::{
    CatalogReader, HybridOrchestrator, RemoteMatchStrategy, RuleBasedRanker, ScoringModel,
    ScoringWeights,
};
use hope_match::routes::{self, AppState};
use hope_match::services::{
    seed_catalog, spawn_retention_job, CachedCatalog, GeminiClient, MatchStore, MemoryStore,
    PostgresClient,
};

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

fn startup_error(context: &str, e: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, e);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, e))
}

/// Wire one concrete store into the catalog cache, orchestrator and retention job
async fn build_state<S: MatchStore + 'static>(store: Arc<S>, settings: &Settings) -> io::Result<AppState> {
    if let Some(path) = &settings.catalog.seed_path {
        let existing = store
            .get_published_offers()
            .await
            .map_err(|e| startup_error("Failed to read catalog", e))?;

        if existing.is_empty() {
            match seed_catalog(store.as_ref(), path).await {
                Ok(count) => info!("Catalog seeded with {} scholarships", count),
                Err(e) => warn!("Catalog seeding skipped: {}", e),
            }
        } else {
            info!("Catalog already holds {} scholarships, skipping seed", existing.len());
        }
    }

    let catalog = Arc::new(CachedCatalog::new(
        store.clone(),
        Duration::from_secs(settings.catalog.cache_ttl_secs),
    ));

    let gemini = GeminiClient::new(settings.gemini.api_key.clone())
        .with_model(settings.gemini.model.clone())
        .with_base_url(settings.gemini.base_url.clone())
        .with_temperature(settings.gemini.temperature)
        .with_timeout(settings.matching.remote_budget())
        .map_err(|e| startup_error("Failed to build Gemini client", e))?;

    if gemini.is_configured() {
        info!("Gemini client initialized (model: {})", gemini.model());
    } else {
        warn!("GEMINI_API_KEY is not set; every run will use rule-based ranking");
    }

    let remote = RemoteMatchStrategy::new(Arc::new(gemini), settings.matching.prompt_limits());

    let weights = ScoringWeights::from(&settings.scoring.weights);
    let ranker = RuleBasedRanker::new(ScoringModel::new(weights));
    info!("Rule-based ranker initialized with weights: {:?}", weights);

    let orchestrator = HybridOrchestrator::new(
        store.clone(),
        catalog,
        store.clone(),
        remote,
        ranker,
        settings.matching.remote_budget(),
    );

    let sweep_interval = settings.retention.interval();
    spawn_retention_job(store.clone(), settings.retention.days, sweep_interval);
    info!(
        "Retention job scheduled (window: {} days, every {}s)",
        settings.retention.days,
        sweep_interval.as_secs()
    );

    Ok(AppState {
        store,
        orchestrator: Arc::new(orchestrator),
    })
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Settings come first so the [logging] section drives the subscriber
    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        io::Error::new(io::ErrorKind::Other, format!("Failed to load configuration: {}", e))
    })?;

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.logging.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true);

    if settings.logging.is_pretty() {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting HOPE matching service...");
    info!("Configuration loaded successfully");

    let app_state = match &settings.database.url {
        Some(url) => {
            let db_max_conn = settings.database.max_connections.unwrap_or(10);
            let postgres = PostgresClient::from_settings(
                url,
                Some(db_max_conn),
                settings.database.min_connections,
            )
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?;

            info!("PostgreSQL client initialized (max: {} connections)", db_max_conn);
            build_state(Arc::new(postgres), &settings).await?
        }
        None => {
            warn!("No database URL configured; using the in-memory store");
            build_state(Arc::new(MemoryStore::new()), &settings).await?
        }
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
