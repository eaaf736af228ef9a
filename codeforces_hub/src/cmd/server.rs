use crate::cmd::UpstreamArgs;
use crate::modules::{
    handlers::{get_problem, list_contests, liveness, not_found},
    service::ContestService,
};
use anyhow::{Context, Result};
use axum::{extract::Extension, http::Method, routing, Router, Server};
use clap::Args;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, Args)]
pub struct ServerArgs {
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,
    #[command(flatten)]
    upstream: UpstreamArgs,
}

pub async fn run(args: ServerArgs) -> Result<()> {
    let service = args.upstream.service()?;
    let app = create_router(service);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    tracing::info!("Server start at port {}", args.port);
    Server::try_bind(&addr)
        .with_context(|| {
            let message = format!("couldn't bind port {}", args.port);
            tracing::error!(message);
            message
        })?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| {
            let message = "server stopped unexpectedly";
            tracing::error!(message);
            message
        })?;

    Ok(())
}

pub fn create_router(service: Arc<ContestService>) -> Router {
    Router::new()
        .route("/contests", routing::get(list_contests))
        .route("/contest/:contest_id/problem/:index", routing::get(get_problem))
        .route("/health", routing::get(liveness))
        .fallback(not_found)
        .layer(Extension(service))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET]),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, starting graceful shutdown.");
}
