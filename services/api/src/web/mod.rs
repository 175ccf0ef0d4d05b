pub mod auth;
pub mod callback;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_auth;
pub use state::{AppState, AuthenticatedUser};

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use auth::{login_handler, logout_handler, signup_handler};
use callback::summary_callback_handler;
use rest::{
    attach_topic_handler, get_summary_handler, list_summaries_handler, set_preference_handler,
    summarize_handler, user_overview_handler, ApiDoc,
};

/// Builds the complete application: public and protected routes, CORS,
/// and the Swagger UI.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/summaries/callback", post(summary_callback_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/user", get(user_overview_handler))
        .route("/summaries", get(list_summaries_handler))
        .route("/summary/{id}", get(get_summary_handler))
        .route("/topic", post(attach_topic_handler))
        .route("/summarize", post(summarize_handler))
        .route("/preference/{preference_type}", post(set_preference_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let mut api_router = Router::new().merge(public_routes).merge(protected_routes);

    match app_state.config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => {
            let cors = CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);
            api_router = api_router.layer(cors);
        }
        Err(e) => warn!(
            "Ignoring invalid CORS origin '{}': {}",
            app_state.config.cors_origin, e
        ),
    }

    Router::new()
        .merge(api_router.with_state(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
