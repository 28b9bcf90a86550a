use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    routing::post,
};
use stockledger_core::AdjustmentId;
use stockledger_inventory::NewAdjustment;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit).get(list_adjustments))
        .route("/bulk", post(bulk_submit))
        .route("/decisions/bulk", post(bulk_decide))
        .route("/:id/decision", post(decide))
}

pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<NewAdjustment>,
) -> axum::response::Response {
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::CREATED, move || services.engine.adjustments.submit(body, actor)).await
}

pub async fn bulk_submit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::BulkAdjustmentsRequest>,
) -> axum::response::Response {
    let workflow = services.engine.adjustments.clone();
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || Ok(workflow.bulk_submit(body.adjustments, actor))).await
}

pub async fn bulk_decide(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::BulkDecisionsRequest>,
) -> axum::response::Response {
    let workflow = services.engine.adjustments.clone();
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || Ok(workflow.bulk_decide(body.decisions, actor))).await
}

pub async fn decide(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DecisionBody>,
) -> axum::response::Response {
    let adjustment_id: AdjustmentId = match errors::parse_id(&id, "adjustment") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || {
        services
            .engine
            .adjustments
            .decide(adjustment_id, body.decision, actor, body.notes)
    })
    .await
}

pub async fn list_adjustments(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::ListParams>,
) -> axum::response::Response {
    errors::respond_blocking(StatusCode::OK, move || {
        params
            .adjustment_query()
            .and_then(|q| services.engine.adjustments.list(&q))
    })
    .await
}
