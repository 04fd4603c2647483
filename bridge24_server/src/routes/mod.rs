use axum::middleware;
use axum::routing::get;
use axum::Router;

pub mod contacts;
pub mod health;
pub mod users;

pub fn router() -> Router {
    Router::new().nest(
        "/api/v1",
        Router::new()
            .route("/health", get(health::get_health))
            .merge(users::public_router())
            .merge(protected_router()),
    )
}

fn protected_router() -> Router {
    Router::new()
        .merge(users::protected_router())
        .merge(contacts::router())
        .layer(middleware::from_fn(crate::middleware::require_auth))
}
