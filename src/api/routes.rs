// src/api/routes.rs

use crate::api::AppState;
use crate::error::{ErrorCategory, OrderError};
use crate::orders::{Order, SwapRequest};
use crate::websocket::order_updates;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use log::{error, info, warn};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

/// JSON error body with the status code matching the error's category.
pub struct ApiError(OrderError);

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrderError::OrderNotFound(_) => StatusCode::NOT_FOUND,
            err if err.category() == ErrorCategory::Input => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/orders/execute", post(execute_order))
        .route("/api/orders/updates/:id", get(order_updates))
        .route("/api/orders/:id", get(get_order))
        .route("/health", get(health_check))
        .layer(cors)
        .with_state(state)
}

async fn execute_order(
    State(state): State<AppState>,
    payload: Result<Json<SwapRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected order submission: {}", rejection.body_text());
        OrderError::Validation(rejection.body_text())
    })?;

    let order_id = state.service.submit(request).await?;
    info!("📨 Order {} submitted over HTTP", order_id);
    Ok(Json(json!({ "orderId": order_id })))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .store
        .get(&id)
        .await?
        .ok_or_else(|| OrderError::OrderNotFound(id.clone()))?;
    Ok(Json(order))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
