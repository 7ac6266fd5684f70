//! Authentication for the dashboard and the hosted AI-proxy API.
//!
//! # Dashboard sessions
//!
//! Users register or log in under `/authentication/*` with a username (or email) and password.
//! A successful login returns an HS256 session JWT both in the response body and as an
//! HTTP-only cookie. The [`CurrentUser`](crate::api::models::users::CurrentUser) extractor accepts
//! either form:
//!
//! - `Authorization: Bearer <jwt>` for API clients and the mobile app
//! - the session cookie for the browser dashboard
//!
//! Passwords are hashed with Argon2id ([`password`]).
//!
//! # Hosted accounts
//!
//! The AI proxy is keyed by email only. `POST /api/auth` creates or fetches the account and returns
//! a bearer token ([`hosted`]); [`HostedUser`](current_user::HostedUser) resolves it on each call.
//!
//! Both token kinds are signed with `secret_key` from the configuration.

pub mod current_user;
pub mod hosted;
pub mod password;
pub mod session;
