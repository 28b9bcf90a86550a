use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Query},
    http::StatusCode,
    routing::get,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(list_audit))
}

pub async fn list_audit(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::ListParams>,
) -> axum::response::Response {
    errors::respond_blocking(StatusCode::OK, move || {
        params.audit_query().and_then(|q| services.engine.audit.list(&q))
    })
    .await
}
