//! HTTP surface: Axum handlers and their request/response models.
//!
//! - **[`handlers`]**: route handlers, grouped by resource
//! - **[`models`]**: request and response bodies, plus the success/error envelopes
//!
//! Dashboard routes authenticate with a session JWT (bearer header or cookie). The hosted
//! generation API under `/api/*` uses its own token, and platform webhooks are unauthenticated
//! but signature-checked where the platform supports it. The OpenAPI document is served at
//! `/api-docs/openapi.json` and browsable at `/docs`.

pub mod handlers;
pub mod models;
