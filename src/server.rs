//! Dashboard HTTP server.
//!
//! Serves the dashboard page and a small JSON API over axum. Every request
//! builds a fresh report; only the result cache is shared between them.

use crate::cache::CacheStats;
use crate::dashboard::Orchestrator;
use crate::models::{FilterSelection, ALL_LABEL};
use crate::pinot::QueryExecutor;
use crate::report::{generate_html_report, generate_json_report};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Query parameters accepted by the page and report endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub subscription: Option<String>,
}

impl ReportParams {
    fn selection(&self) -> FilterSelection {
        FilterSelection::from_param(self.subscription.as_deref())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    broker: String,
    cache: CacheStats,
}

/// Build the router over a shared orchestrator.
pub fn router<E>(orchestrator: Arc<Orchestrator<E>>) -> Router
where
    E: QueryExecutor + 'static,
{
    Router::new()
        .route("/", get(index::<E>))
        .route("/api/report", get(api_report::<E>))
        .route("/api/filters", get(api_filters::<E>))
        .route("/api/cache/clear", post(clear_cache::<E>))
        .route("/healthz", get(healthz::<E>))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

/// Serve until Ctrl-C.
pub async fn serve<E>(orchestrator: Arc<Orchestrator<E>>, bind: SocketAddr) -> anyhow::Result<()>
where
    E: QueryExecutor + 'static,
{
    let listener = TcpListener::bind(bind).await?;
    info!("Dashboard listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Dashboard server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn index<E: QueryExecutor>(
    State(orchestrator): State<Arc<Orchestrator<E>>>,
    Query(params): Query<ReportParams>,
) -> Response {
    let report = orchestrator.build_report(&params.selection()).await;

    match generate_html_report(&report) {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            error!("Failed to render dashboard: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn api_report<E: QueryExecutor>(
    State(orchestrator): State<Arc<Orchestrator<E>>>,
    Query(params): Query<ReportParams>,
) -> Response {
    let report = orchestrator.build_report(&params.selection()).await;

    match generate_json_report(&report) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn api_filters<E: QueryExecutor>(
    State(orchestrator): State<Arc<Orchestrator<E>>>,
) -> Response {
    match orchestrator.list_filter_values().await {
        Ok(values) => {
            let options: Vec<String> = std::iter::once(ALL_LABEL.to_string())
                .chain(values)
                .collect();
            Json(options).into_response()
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorBody {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

async fn clear_cache<E: QueryExecutor>(
    State(orchestrator): State<Arc<Orchestrator<E>>>,
) -> Json<CacheStats> {
    orchestrator.clear_cache().await;
    info!("Result cache cleared via API");
    Json(orchestrator.cache_stats().await)
}

async fn healthz<E: QueryExecutor>(
    State(orchestrator): State<Arc<Orchestrator<E>>>,
) -> (StatusCode, Json<HealthBody>) {
    let cache = orchestrator.cache_stats().await;

    match orchestrator.executor().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthBody {
                status: "ok",
                broker: "reachable".to_string(),
                cache,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthBody {
                status: "degraded",
                broker: e.to_string(),
                cache,
            }),
        ),
    }
}
