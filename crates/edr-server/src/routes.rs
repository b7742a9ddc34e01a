use axum::routing::post;
use axum::Router;

use crate::handlers::rpc;
use crate::state::ControlPlane;

/// The four unary RPCs (§4.10), exposed over plain HTTP alongside the
/// WebSocket stream endpoint wired in `lib.rs`.
pub fn create_rpc_routes() -> Router<ControlPlane> {
    Router::new()
        .route("/agents/register", post(rpc::register_agent))
        .route("/agents/status", post(rpc::update_status))
        .route("/iocs/match-report", post(rpc::report_ioc_match))
        .route("/commands", post(rpc::send_command))
}
