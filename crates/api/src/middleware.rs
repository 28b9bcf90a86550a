use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use stockledger_core::UserId;

use crate::app::errors;
use crate::context::ActorContext;

/// Header carrying the caller's user id (UUID), set by the upstream auth layer.
pub const ACTOR_HEADER: &str = "x-actor-id";

pub async fn actor_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let actor = match extract_actor(req.headers()) {
        Ok(actor) => actor,
        Err(msg) => return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", msg),
    };

    req.extensions_mut().insert(ActorContext::new(actor));
    next.run(req).await
}

fn extract_actor(headers: &HeaderMap) -> Result<UserId, &'static str> {
    let header = headers
        .get(ACTOR_HEADER)
        .ok_or("missing x-actor-id header")?;

    let raw = header.to_str().map_err(|_| "x-actor-id is not valid text")?;

    let actor: UserId = raw.trim().parse().map_err(|_| "x-actor-id is not a valid id")?;
    // The nil id is reserved for background jobs.
    if actor.is_system() {
        return Err("x-actor-id cannot be the system actor");
    }

    Ok(actor)
}
