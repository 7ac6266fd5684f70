//! Request extractors for the two kinds of caller.
//!
//! - [`CurrentUser`]: dashboard users, authenticated by a session JWT sent either as
//!   `Authorization: Bearer <jwt>` or in the session cookie.
//! - [`HostedUser`]: hosted AI-proxy accounts, authenticated by a hosted token in the
//!   `Authorization` header only.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::{hosted, session},
    db::{errors::DbError, handlers::ApiUsers, models::api_users::ApiUserDBResponse},
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Session token from the session cookie, if one is set.
fn session_cookie_token<'a>(parts: &'a Parts, cookie_name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value)
}

fn authorization(parts: &Parts) -> Option<&str> {
    parts.headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // A bearer token wins over the cookie; a bad one falls through so a stale header does not
        // lock out a browser that also has a valid session.
        if let Some(token) = authorization(parts).and_then(hosted::parse_bearer) {
            match session::verify_session_token(token, &state.config) {
                Ok(user) => {
                    debug!("Authenticated user {} from bearer token", user.id);
                    return Ok(user);
                }
                Err(e) => trace!("Bearer session token rejected: {:?}", e),
            }
        }

        if let Some(token) = session_cookie_token(parts, &state.config.auth.session.cookie_name) {
            match session::verify_session_token(token, &state.config) {
                Ok(user) => {
                    debug!("Authenticated user {} from session cookie", user.id);
                    return Ok(user);
                }
                Err(e) => trace!("Session cookie rejected: {:?}", e),
            }
        }

        Err(Error::Unauthenticated { message: None })
    }
}

/// A hosted AI-proxy account resolved from its bearer token.
#[derive(Debug, Clone)]
pub struct HostedUser(pub ApiUserDBResponse);

impl FromRequestParts<AppState> for HostedUser {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let unauthenticated = |message: &str| Error::Unauthenticated {
            message: Some(message.to_string()),
        };

        let header = authorization(parts).ok_or_else(|| unauthenticated("No authorization header"))?;
        let token = hosted::parse_bearer(header).ok_or_else(|| unauthenticated("Invalid authorization format"))?;
        let claims = hosted::verify_hosted_token(token, &state.config)?;

        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        let user = ApiUsers::new(&mut conn)
            .get_by_id(claims.user_id)
            .await?
            .ok_or_else(|| unauthenticated("User not found"))?;

        Ok(HostedUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hosted::create_hosted_token;
    use crate::test_utils::{create_test_state, create_test_user};
    use axum::http::Request;
    use sqlx::SqlitePool;

    fn parts_with(name: &str, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .uri("http://localhost/test")
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    fn session_token(state: &AppState, user: &crate::db::models::users::UserDBResponse) -> String {
        let current = CurrentUser::from(crate::api::models::users::UserResponse::from(user.clone()));
        session::create_session_token(&current, &state.config).unwrap()
    }

    async fn hosted_error(mut parts: Parts, state: &AppState) -> String {
        HostedUser::from_request_parts(&mut parts, state).await.unwrap_err().user_message()
    }

    #[test]
    fn test_session_cookie_token() {
        let parts = parts_with("cookie", "theme=dark; provokely_session=abc.def; other=1");
        assert_eq!(session_cookie_token(&parts, "provokely_session"), Some("abc.def"));
        assert_eq!(session_cookie_token(&parts, "missing"), None);

        let parts = parts_with("cookie", "provokely_session=");
        assert_eq!(session_cookie_token(&parts, "provokely_session"), None);
    }

    #[sqlx::test]
    async fn test_bearer_and_cookie_authentication(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool, "alice").await;
        let token = session_token(&state, &user);

        let mut parts = parts_with("authorization", &format!("Bearer {token}"));
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current.id, user.id);

        let mut parts = parts_with("cookie", &format!("provokely_session={token}"));
        let current = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current.username, "alice");
    }

    #[sqlx::test]
    async fn test_missing_or_bad_credentials(pool: SqlitePool) {
        let state = create_test_state(pool);

        let (mut parts, _) = Request::builder().uri("/test").body(()).unwrap().into_parts();
        let err = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err.code(), "AUTH_FAILED");

        let mut parts = parts_with("authorization", "Bearer nope");
        assert!(CurrentUser::from_request_parts(&mut parts, &state).await.is_err());
    }

    #[sqlx::test]
    async fn test_hosted_user_errors(pool: SqlitePool) {
        let state = create_test_state(pool.clone());

        let (parts, _) = Request::builder().uri("/api/ai").body(()).unwrap().into_parts();
        assert_eq!(hosted_error(parts, &state).await, "No authorization header");
        assert_eq!(
            hosted_error(parts_with("authorization", "Token abc"), &state).await,
            "Invalid authorization format"
        );
        assert_eq!(
            hosted_error(parts_with("authorization", "Bearer not-a-jwt"), &state).await,
            "Invalid token"
        );

        // well-formed token for an account that was never stored
        let ghost = ApiUserDBResponse {
            id: uuid::Uuid::new_v4(),
            email: "ghost@example.com".to_string(),
            is_pro: false,
            projects_remaining: 0,
            total_requests: 0,
            total_tokens_used: 0,
            total_cost_units: 0,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let token = create_hosted_token(&ghost, &state.config).unwrap();
        assert_eq!(
            hosted_error(parts_with("authorization", &format!("Bearer {token}")), &state).await,
            "User not found"
        );
    }

    #[sqlx::test]
    async fn test_hosted_user_resolves(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let api_user = {
            let mut conn = pool.acquire().await.unwrap();
            ApiUsers::new(&mut conn).get_or_create("Dev@Example.com", 3).await.unwrap()
        };
        let token = create_hosted_token(&api_user, &state.config).unwrap();

        let mut parts = parts_with("authorization", &format!("Bearer {token}"));
        let HostedUser(resolved) = HostedUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(resolved.email, "dev@example.com");
    }
}
