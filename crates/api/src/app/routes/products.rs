use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post, put},
};
use tracing::warn;

use stockledger_core::ProductId;
use stockledger_infra::store::CatalogProduct;
use stockledger_inventory::StockThresholds;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_product).get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/thresholds", put(configure_thresholds))
        .route("/:id/hold", post(place_hold).delete(release_hold))
}

pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<dto::RegisterProductRequest>,
) -> axum::response::Response {
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::CREATED, move || {
        let product_id = body.product_id.unwrap_or_else(ProductId::new);
        let registered = services.engine.register_product(
            product_id,
            body.sku.clone(),
            body.initial_physical_stock,
            body.thresholds,
            actor,
        )?;

        let entry = CatalogProduct {
            product_id,
            name: body.name.unwrap_or_else(|| body.sku.clone()),
            sku: body.sku,
            legacy_stock_quantity: body.legacy_stock_quantity,
            unit_cost: body.unit_cost,
            unit_price: body.unit_price,
        };
        if let Err(e) = services.catalog.upsert(entry) {
            warn!(product_id = %product_id, error = %e, "catalog entry not stored");
        }
        Ok(registered)
    })
    .await
}

pub async fn list_products(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::respond_blocking(StatusCode::OK, move || services.engine.ledger.list_stock()).await
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    errors::respond_blocking(StatusCode::OK, move || services.engine.ledger.get_stock(product_id)).await
}

pub async fn configure_thresholds(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<StockThresholds>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || {
        services.engine.configure_thresholds(product_id, body, actor)
    })
    .await
}

pub async fn place_hold(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PlaceHoldRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || {
        services
            .engine
            .ledger
            .place_hold(product_id, body.reason, body.until, actor)
            .map(|update| update.after)
    })
    .await
}

pub async fn release_hold(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match errors::parse_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let actor = ctx.actor();
    errors::respond_blocking(StatusCode::OK, move || {
        services
            .engine
            .ledger
            .release_hold(product_id, actor)
            .map(|update| update.after)
    })
    .await
}
