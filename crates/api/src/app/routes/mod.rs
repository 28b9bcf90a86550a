use axum::Router;

pub mod adjustments;
pub mod alerts;
pub mod audit;
pub mod products;
pub mod reports;
pub mod reservations;
pub mod system;

/// Router for all endpoints that act on behalf of a user.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/reservations", reservations::router())
        .route("/returns", axum::routing::post(reservations::return_stock))
        .nest("/adjustments", adjustments::router())
        .nest("/alerts", alerts::router())
        .nest("/audit", audit::router())
        .nest("/reports", reports::router())
}
