use sqlx::postgres::PgPoolOptions;

use jobly_api::auth::TokenService;
use jobly_api::config;
use jobly_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SECRET_KEY, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting Jobly API in {:?} mode", config.environment);

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;

    // The verification secret is injected here, not read ambiently by the
    // token service.
    let tokens = TokenService::new(&config.security.jwt_secret);
    let app = jobly_api::app(AppState { pool, tokens });

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Jobly API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
