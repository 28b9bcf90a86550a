//! HTTP API: routing, actor context, and request/response mapping for the
//! stock ledger services.

pub mod app;
pub mod context;
pub mod middleware;
