// Campus Portal Server - announcements, events and resources over REST

use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use campus_portal::{app_state::AppState, config::Config, data_seeder::seed_demo_data};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("campus_portal=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    if config.seed_demo_data {
        seed_demo_data(&app_state).await?;
    }

    // Build main application router
    let app = app_state.router().layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    // Start server
    let addr = config.server_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Campus portal listening on http://{}", listener.local_addr()?);
    info!("  GET/POST        /api/{{announcements,events,resources}}");
    info!("  GET/PUT/DELETE  /api/{{kind}}/{{id}}");
    info!("  POST            /api/{{kind}}/{{id}}/comments, /like, /register, /cancel");
    info!("  GET /api/auth/me, POST /api/auth/logout, GET /api/health");

    axum::serve(listener, app).await?;

    Ok(())
}
