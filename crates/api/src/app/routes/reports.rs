use std::sync::Arc;

use axum::{
    Router,
    extract::Extension,
    http::StatusCode,
    routing::get,
};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/consistency", get(consistency_report))
}

pub async fn consistency_report(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    errors::respond_blocking(StatusCode::OK, move || services.engine.reconciler.run()).await
}
