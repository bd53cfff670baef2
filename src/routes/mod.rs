pub mod code_routes;
pub mod entity_routes;

use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::{limit::ConcurrencyLimitLayer, ServiceBuilder};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::middleware::cors::{cors_middleware, cors_middleware_with_origins};
use crate::models::EntityKind;
use crate::state::AppState;

/// Construir el router completo de la API
pub fn create_router(state: AppState) -> Router {
    let cors = if state.config.is_development() || state.config.cors_origins.is_empty() {
        cors_middleware()
    } else {
        cors_middleware_with_origins(state.config.cors_origins.clone())
    };

    let mut api = Router::new().nest("/codes", code_routes::create_code_router());
    for kind in EntityKind::ALL {
        api = api.nest(
            &format!("/{}", kind.plural()),
            entity_routes::create_entity_router(kind),
        );
    }

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(TimeoutLayer::new(state.config.request_timeout))
                .layer(ConcurrencyLimitLayer::new(state.config.max_concurrent_requests)),
        )
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
