use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use memoir_api::auth::{AppState, AppStateInner};
use memoir_imagestore::HttpImageStore;

/// Base64 image payloads ride inside JSON request bodies.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memoir=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("MEMOIR_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("MEMOIR_DB_PATH").unwrap_or_else(|_| "memoir.db".into());
    let host = std::env::var("MEMOIR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MEMOIR_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()?;
    let cors_origin =
        std::env::var("MEMOIR_CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".into());
    let image_store_url =
        std::env::var("MEMOIR_IMAGE_STORE_URL").unwrap_or_else(|_| "http://localhost:9000".into());
    let image_store_key = std::env::var("MEMOIR_IMAGE_STORE_API_KEY").unwrap_or_default();
    let image_store_timeout: u64 = std::env::var("MEMOIR_IMAGE_STORE_TIMEOUT_SECS")
        .unwrap_or_else(|_| "30".into())
        .parse()?;

    // Init database
    let db = memoir_db::Database::open(&PathBuf::from(&db_path))?;

    let images = HttpImageStore::new(
        &image_store_url,
        &image_store_key,
        Duration::from_secs(image_store_timeout),
    )?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        images: Arc::new(images),
        jwt_secret,
    });

    // The session rides in a cookie, so CORS pins the origin and allows
    // credentials.
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let app = memoir_api::router(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Memoir server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
