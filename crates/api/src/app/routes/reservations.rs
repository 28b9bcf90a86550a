use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    routing::post,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(reserve).get(list_reservations))
        .route("/fulfill", post(fulfill))
        .route("/cancel", post(cancel))
}

pub async fn reserve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::ReserveRequest>,
) -> axum::response::Response {
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::CREATED, move || {
        services
            .engine
            .reservations
            .reserve(body.product_id, body.order_id, body.quantity, actor)
    })
    .await
}

pub async fn fulfill(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::FulfillRequest>,
) -> axum::response::Response {
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || {
        services
            .engine
            .reservations
            .fulfill(body.product_id, body.order_id, body.quantity, actor)
    })
    .await
}

pub async fn cancel(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::CancelRequest>,
) -> axum::response::Response {
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || {
        services.engine.reservations.cancel(body.product_id, body.order_id, actor)
    })
    .await
}

pub async fn return_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::ReturnRequest>,
) -> axum::response::Response {
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || {
        services
            .engine
            .reservations
            .return_stock(body.product_id, body.order_id, body.quantity, &body.reason, actor)
    })
    .await
}

pub async fn list_reservations(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::ListParams>,
) -> axum::response::Response {
    errors::respond_blocking(StatusCode::OK, move || {
        params
            .reservation_query()
            .and_then(|q| services.engine.reservations.list(&q))
    })
    .await
}
