pub mod config;
pub mod handlers;
pub mod iocs;
pub mod liveness;
pub mod matches;
pub mod persistence;
pub mod push;
pub mod queue;
pub mod registry;
pub mod results;
pub mod routes;
pub mod state;
pub mod stream_registry;
pub mod telemetry;
pub mod websocket;

pub use routes::create_rpc_routes;
pub use state::ControlPlane;

use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

async fn metrics_handler() -> Response<String> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(telemetry::render_metrics())
        .expect("static metrics response is well-formed")
}

pub fn create_app(control: ControlPlane) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(metrics_handler))
        .route("/v1/stream", get(websocket::stream_broker))
        .nest("/v1", create_rpc_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(control)
}
