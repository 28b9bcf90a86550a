use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::{get, post},
};
use stockledger_core::{AlertId, ProductId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_alerts))
        .route("/check/:product_id", post(check_product))
        .route("/:id/acknowledge", post(acknowledge))
        .route("/:id/resolve", post(resolve))
        .route("/:id/dismiss", post(dismiss))
}

pub async fn check_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&product_id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond_blocking(StatusCode::OK, move || services.engine.alerts.evaluate(product_id)).await
}

pub async fn acknowledge(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let alert_id: AlertId = match errors::parse_id(&id, "alert") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || services.engine.alerts.acknowledge(alert_id, actor)).await
}

pub async fn resolve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let alert_id: AlertId = match errors::parse_id(&id, "alert") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || services.engine.alerts.resolve(alert_id, actor)).await
}

pub async fn dismiss(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let alert_id: AlertId = match errors::parse_id(&id, "alert") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || services.engine.alerts.dismiss(alert_id, actor)).await
}

pub async fn list_alerts(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::ListParams>,
) -> axum::response::Response {
    errors::respond_blocking(StatusCode::OK, move || {
        params.alert_query().and_then(|q| services.engine.alerts.list(&q))
    })
    .await
}
