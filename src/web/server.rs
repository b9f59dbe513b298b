use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::api::{
    health_check, ingest, method_not_allowed, missing_tenant, not_found, DrainState,
};

/// Routes of the drain endpoint
pub fn router(state: Arc<DrainState>) -> Router {
    Router::new()
        .route(
            "/",
            get(health_check)
                .post(missing_tenant)
                .fallback(method_not_allowed),
        )
        .route(
            "/*tenant",
            post(ingest).get(not_found).fallback(method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the drain until `shutdown` is cancelled. In-flight requests then get
/// `grace` to finish before the server stops waiting for them.
pub async fn run_server(
    addr: SocketAddr,
    state: Arc<DrainState>,
    shutdown: CancellationToken,
    grace: Duration,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Drain listening");

    let signal = shutdown.clone();
    let server = axum::serve(listener, router(state)).with_graceful_shutdown(async move {
        signal.cancelled().await;
        info!("Drain shutting down gracefully");
    });

    let server = std::future::IntoFuture::into_future(server);
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result,
        _ = shutdown.cancelled() => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result,
        Err(_) => {
            warn!(grace = ?grace, "In-flight requests did not finish before the grace period");
            Ok(())
        }
    }
}
