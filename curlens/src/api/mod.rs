//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for the report endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`;
//! interactive documentation is served at `/docs` when the server is running.

pub mod handlers;
pub mod models;
