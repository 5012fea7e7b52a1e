//! Atrium server

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atrium::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxPageRepository, SqlxSessionRepository, SqlxSiteRepository, SqlxUserRepository,
        },
    },
    services::{PageService, RolePagePermissions, SessionService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atrium=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Atrium...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    let page_repo = SqlxPageRepository::boxed(pool.clone());
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let permissions = Arc::new(RolePagePermissions::new(config.cms.username_max_length));

    let state = AppState {
        page_service: Arc::new(PageService::new(page_repo, permissions, &config.cms)),
        session_service: Arc::new(SessionService::new(session_repo, user_repo)),
        site_repo: SqlxSiteRepository::boxed(pool.clone()),
        cms: Arc::new(config.cms.clone()),
    };

    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    pool.close().await;
    Ok(())
}
