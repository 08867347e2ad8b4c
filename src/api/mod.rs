//! HTTP glue over the metrics facade

pub mod handlers;
pub mod routes;

pub use routes::create_api_router;
