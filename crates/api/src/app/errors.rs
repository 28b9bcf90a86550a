use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::json;

use stockledger_core::{DomainError, DomainResult};

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::InsufficientStock { .. }
        | DomainError::InsufficientReservedQuantity { .. }
        | DomainError::AlreadyDecided(_)
        | DomainError::AlreadyProcessed(_)
        | DomainError::ConcurrentModification(_) => StatusCode::CONFLICT,
        DomainError::NegativeStockRejected { .. } | DomainError::InvariantViolation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        DomainError::Unauthorized => StatusCode::FORBIDDEN,
        DomainError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// `status` + JSON body on success, mapped domain error otherwise.
pub fn respond<T: Serialize>(status: StatusCode, result: DomainResult<T>) -> axum::response::Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(e) => domain_error_to_response(e),
    }
}

/// Run a service call on the blocking pool, then [`respond`] with its result.
///
/// Service calls take store locks and sleep between conflict retries.
pub async fn respond_blocking<T, F>(status: StatusCode, call: F) -> axum::response::Response
where
    F: FnOnce() -> DomainResult<T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let result = tokio::task::spawn_blocking(call)
        .await
        .unwrap_or_else(|e| Err(DomainError::invariant(format!("service worker failed: {e}"))));
    respond(status, result)
}

/// Parse a path segment into a typed id.
pub fn parse_id<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr,
{
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}
