//! API router setup

use crate::handlers::{self, AppState};
use axum::http::StatusCode;
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Grouped aggregates
        .route("/api/average-intensity-by-topic", get(handlers::average_intensity_by_topic))
        .route(
            "/api/most-relevant-insights-by-region",
            get(handlers::most_relevant_insights_by_region),
        )
        .route("/api/likelihood-by-country", get(handlers::likelihood_by_country))
        .route("/api/intensity-over-years", get(handlers::intensity_over_years))
        .route("/api/insights-count-by-country", get(handlers::insights_count_by_country))
        .route("/api/prevalent-topics-by-region", get(handlers::prevalent_topics_by_region))
        .route("/api/most-relevant-topics", get(handlers::most_relevant_topics))
        .route("/api/distribution-by-pestle", get(handlers::distribution_by_pestle))
        // Record retrieval
        .route("/api/search", get(handlers::search))
        .route("/api/get-insights-by-categories", get(handlers::get_insights_by_categories))
        // Counts
        .route("/api/get-count", get(handlers::get_count))
        .route(
            "/api/insights-with-different-likelihood",
            get(handlers::insights_with_different_likelihood),
        )
        .route(
            "/api/top-5-countries-with-highest-number-of-insights",
            get(handlers::top_countries_with_highest_number_of_insights),
        )
        // Add middleware
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use insights_storage::MemoryStore;

    #[test]
    fn test_router_creation() {
        let state = Arc::new(AppState::new(
            Arc::new(MemoryStore::default()),
            Duration::from_secs(30),
            100,
        ));
        let _router = create_router(state, Duration::from_secs(30));
    }
}
