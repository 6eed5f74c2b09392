pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod form;
pub mod jenkins;
pub mod logging;
pub mod relay;
pub mod signature;
pub mod slack;

use axum::{Router, middleware, routing};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::dispatch::Dispatcher;
use crate::relay::RelayClient;

pub struct AppState {
    pub config: RelayConfig,
    pub client: Arc<dyn RelayClient>,
    pub dispatcher: Dispatcher,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: RelayConfig, client: Arc<dyn RelayClient>) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::new(Arc::clone(&client)),
            client,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;

/// All relay routes. Slack-originated routes sit behind the signature check.
pub fn build_router(state: SharedState) -> Router {
    let slack_routes = Router::new()
        .route("/bmi", routing::post(api::open_bmi_form))
        .route("/slack/interactions", routing::post(api::handle_interaction))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            signature::require_slack_signature,
        ));

    Router::new()
        .route("/", routing::get(api::root))
        .route("/health", routing::get(api::root))
        .route("/status", routing::get(api::status))
        .route("/jenkins/result", routing::post(api::receive_result))
        .merge(slack_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
