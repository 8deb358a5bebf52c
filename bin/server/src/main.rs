use keygate_server::{
    auth::{
        AppState,
        directory::{PgSessionStore, PgUserDirectory},
        flow::LoginFlow,
        github::GithubProvider,
        google::GoogleProvider,
        middleware::AccessGate,
        revocation::RedisLedger,
        routes,
        token::TokenService,
    },
    config::ServerConfig,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Connect the revocation ledger
    let ledger = Arc::new(
        RedisLedger::connect(&config.redis_url)
            .await
            .expect("failed to connect to redis"),
    );

    // Build provider adapters
    let google =
        Arc::new(GoogleProvider::new(config.google).expect("invalid google configuration"));
    let github =
        Arc::new(GithubProvider::new(config.github).expect("invalid github configuration"));

    let tokens = TokenService::new(
        config.auth.secret_key.clone(),
        config.auth.access_ttl(),
        config.auth.refresh_ttl(),
    );
    let directory = Arc::new(PgUserDirectory::new(db_pool.clone()));
    let sessions = Arc::new(PgSessionStore::new(db_pool));

    let flow = LoginFlow::new(
        directory.clone(),
        sessions,
        tokens.clone(),
        ledger.clone(),
        config.auth.logout_policy,
        config.auth.new_user_status,
    )
    .register(google)
    .register(github);

    let gate = AccessGate::new(tokens, ledger, directory);

    let app_state = Arc::new(AppState::new(flow, gate, config.auth.secure_cookies));

    let app = routes::router(app_state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind listener");
    tracing::info!(addr = %config.listen_addr, "listening");

    axum::serve(listener, app)
        .await
        .expect("server terminated");
}
