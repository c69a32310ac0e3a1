//! Products API server: loads settings, prepares the database and serves the router.

use products_api::{
    app, apply_migrations, connect_pool, ensure_database_exists, load_dotenv, AppState, Settings,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_dotenv(&std::env::current_dir()?);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("products_api=info".parse()?))
        .init();
    for file in &loaded {
        tracing::info!(file = %file.display(), "loaded environment file");
    }

    let settings = Settings::from_env()?;
    tracing::info!(
        environment = settings.environment.name(),
        title = %settings.app.title,
        version = %settings.app.version,
        "starting"
    );

    ensure_database_exists(&settings.db).await?;
    let pool = connect_pool(&settings.db).await?;
    let applied = apply_migrations(&pool).await?;
    if !applied.is_empty() {
        tracing::info!(?applied, "migrations applied");
    }

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let router = app(AppState::new(pool, settings));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
