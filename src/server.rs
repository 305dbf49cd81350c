use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{Html, IntoResponse},
    routing::get,
};
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::config::{AppConfig, CorsConfig};
use crate::llm::backend_from_config;
use crate::relay::build_schema;

/// Path the GraphQL endpoint is mounted at.
pub const GRAPHQL_PATH: &str = "/graphql";

const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Start the relay with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let backend = backend_from_config(&config.llm)?;
    let state = AppState {
        schema: build_schema(backend),
        config: Arc::clone(&config),
    };

    let app = build_router(state)?;

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        graphql = GRAPHQL_PATH,
        "Relay started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(name: "server.stopped", "Relay stopped");
    Ok(())
}

/// Assemble routes and middleware for `state`.
///
/// # Errors
///
/// Fails when a configured CORS origin is not a valid header value.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors = cors_layer(&state.config.cors)?;

    // 0 disables the limit
    let timeout_duration = match state.config.server.request_timeout_secs {
        0 => Duration::from_secs(365 * 24 * 60 * 60),
        secs => Duration::from_secs(secs),
    };

    let app = Router::new()
        .route(GRAPHQL_PATH, get(graphiql).post(graphql_handler))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| async move {
                match tokio::time::timeout(timeout_duration, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        .layer(cors)
        .with_state(state);

    Ok(app)
}

/// CORS policy: listed origins only, with credentials.
pub fn cors_layer(cfg: &CorsConfig) -> anyhow::Result<CorsLayer> {
    let origins = cfg
        .allowed_origins
        .iter()
        .map(|o| HeaderValue::from_str(o.trim()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /graphql - Execute a query or mutation.
async fn graphql_handler(State(state): State<AppState>, req: GraphQLRequest) -> GraphQLResponse {
    state.schema.execute(req.into_inner()).await.into()
}

/// GET /graphql - Interactive explorer.
async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint(GRAPHQL_PATH).finish())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
