//! Skill swap service: accounts and sessions, profiles, a shared skill
//! catalog, per-user skill listings, swap requests and feedback.

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
pub mod services;

use routes::{
    feedbacks::Feedbacks, profiles::Profiles, resource, skills::Skills,
    swap_requests::SwapRequests, user_skills::UserSkills,
};
use services::{access::Access, identity::Identity};

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
}

impl AppState {
    pub fn identity(&self) -> Identity<'_> {
        Identity::new(&self.db.pool, self.config.session_ttl_hours)
    }

    pub fn access(&self) -> Access {
        Access {
            policy: self.config.access_policy,
            transitions: self.config.status_transitions,
        }
    }
}

pub fn app(state: AppState) -> Router {
    // Everything here requires a live session
    let protected_routes = Router::new()
        .merge(resource::router::<Profiles>())
        .merge(resource::router::<Skills>())
        .merge(resource::router::<UserSkills>())
        .merge(resource::router::<SwapRequests>())
        .merge(resource::router::<Feedbacks>())
        .merge(routes::auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(routes::pages::router())
        .merge(routes::auth::router())
        .merge(protected_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}
