pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// Build the full application: peer RPCs under `/rpc`, operator
/// endpoints under `/api`.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let rpc_routes = Router::new()
        .route("/subscribe", post(handlers::handle_subscribe))
        .route("/replicate", post(handlers::handle_replicate))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/groups", get(handlers::handle_groups))
        .route("/groups/{key}", get(handlers::handle_group_inspect))
        .route("/sweep", post(handlers::handle_sweep))
        .route("/vnodes/regenerate", post(handlers::handle_regenerate))
        .route("/daemon/shutdown", post(handlers::handle_shutdown))
        .with_state(state);

    Router::new()
        .nest("/rpc", rpc_routes)
        .nest("/api", api_routes)
        .layer(cors)
}

pub async fn serve(state: ApiState, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    tracing::info!(host, port, "API listening");
    serve_on(listener, state).await
}

/// Serve on an already bound listener until the shutdown channel fires.
pub async fn serve_on(listener: TcpListener, state: ApiState) -> anyhow::Result<()> {
    let mut shutdown = state.shutdown_tx.subscribe();
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    tracing::info!("API stopped");
    Ok(())
}
