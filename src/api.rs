//! HTTP surface: bulk import endpoint plus read-only dashboard routes.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use crate::config::ServeConfig;
use crate::dashboard::{self, AvailableFilters, DashboardView};
use crate::error::{Error, Result};
use crate::import::{BulkImporter, ImportBatch, ImportResponse};
use crate::models::{Attendant, FilterSet, Unit};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub token: Arc<str>,
    pub top_n: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Comma-separated selections, e.g. `?periods=2025-01,2025-02&units=Centro`.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    periods: Option<String>,
    units: Option<String>,
    attendants: Option<String>,
    top: Option<usize>,
}

impl DashboardQuery {
    fn filters(&self) -> FilterSet {
        FilterSet::new(
            split_list(self.periods.as_deref()),
            split_list(self.units.as_deref()),
            split_list(self.attendants.as_deref()),
        )
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn create_router(state: AppState) -> Router {
    let import_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ]);
    let read_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([AUTHORIZATION]);

    let imports = Router::new()
        .route("/bulk-import", post(bulk_import))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .layer(import_cors);

    let reads = Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/filters", get(get_filters))
        .route("/units", get(list_units))
        .route("/attendants", get(list_attendants))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .layer(read_cors);

    Router::new()
        .route("/health", get(health))
        .merge(imports)
        .merge(reads)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(config: &ServeConfig, state: AppState) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("listening on {}", config.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token) if bool::from(token.as_bytes().ct_eq(state.token.as_bytes())) => {
            next.run(request).await
        }
        Some(_) => Error::Unauthorized("invalid bearer token".to_string()).into_response(),
        None => Error::Unauthorized("missing bearer token".to_string()).into_response(),
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn bulk_import(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ImportBatch>, JsonRejection>,
) -> (StatusCode, Json<ImportResponse>) {
    let batch = match payload {
        Ok(Json(batch)) => batch,
        Err(rejection) => {
            let message = rejection.body_text();
            warn!(error = %message, "bulk import body rejected");
            return (StatusCode::BAD_REQUEST, Json(ImportResponse::rejected(message)));
        }
    };
    info!(rows = batch.total_rows(), "bulk import received");
    let report = BulkImporter::new(state.store.as_ref()).run(&batch).await;
    (StatusCode::OK, Json(ImportResponse::from(report)))
}

async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardView>> {
    let records = state.store.fetch_metric_records().await?;
    let top_n = query.top.unwrap_or(state.top_n).max(1);
    Ok(Json(dashboard::build_dashboard(&records, &query.filters(), top_n)))
}

async fn get_filters(State(state): State<AppState>) -> Result<Json<AvailableFilters>> {
    let records = state.store.fetch_metric_records().await?;
    Ok(Json(dashboard::available_filters(&records)))
}

async fn list_units(State(state): State<AppState>) -> Result<Json<Vec<Unit>>> {
    Ok(Json(state.store.list_units().await?))
}

async fn list_attendants(State(state): State<AppState>) -> Result<Json<Vec<Attendant>>> {
    Ok(Json(state.store.list_attendants().await?))
}
