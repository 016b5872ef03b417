mod routes;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::{config::Config, handler::AlertSchedulerHandler};

pub struct Server {
    handler: Arc<AlertSchedulerHandler>,
}

impl Server {
    pub fn new(_config: &Config, handler: Arc<AlertSchedulerHandler>) -> Self {
        Self { handler }
    }

    pub fn build_router(self) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/alerts", get(routes::list_alerts))
            .route("/alerts/{uuid}", delete(routes::purge_alert))
            .route("/alerts/execute", post(routes::execute_alerts))
            .route("/configurations", post(routes::update_configurations))
            .route("/definitions", post(routes::update_definitions))
            .route("/reschedule", post(routes::reschedule))
            .route("/jobs", get(routes::list_jobs))
            .route("/metrics", get(routes::metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(self.handler)
    }
}
