use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    AppState,
    api::models::{
        envelope::ApiResponse,
        users::{AuthResponse, CurrentUser, LoginRequest, RegisterRequest, UserResponse},
    },
    auth::{password, session},
    db::{
        errors::DbError,
        handlers::{Repository, Settings, Users},
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
    errors::{Error, Result},
};

/// Auth payload plus the `Set-Cookie` header carrying the same token.
pub struct SessionResponse {
    status: StatusCode,
    body: ApiResponse<AuthResponse>,
    cookie: String,
}

impl IntoResponse for SessionResponse {
    fn into_response(self) -> Response {
        (self.status, [(header::SET_COOKIE, self.cookie)], Json(self.body)).into_response()
    }
}

fn start_session(state: &AppState, user: UserDBResponse, status: StatusCode, message: &str) -> Result<SessionResponse> {
    let user = UserResponse::from(user);
    let token = session::create_session_token(&CurrentUser::from(user.clone()), &state.config)?;
    let cookie = session::session_cookie(&token, &state.config);

    Ok(SessionResponse {
        status,
        body: ApiResponse::with_message(
            AuthResponse {
                user,
                access_token: token,
                token_type: "bearer".to_string(),
            },
            message,
        ),
        cookie,
    })
}

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid username or password".to_string()),
    }
}

/// Register a new dashboard account
#[utoipa::path(
    post,
    path = "/authentication/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Invalid input or registration disabled"),
        (status = 409, description = "Username or email already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<SessionResponse> {
    if !state.config.auth.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    let username = request.username.trim().to_string();
    let email = request.email.trim().to_lowercase();
    if username.is_empty() || !email.contains('@') {
        return Err(Error::BadRequest {
            message: "A username and a valid email are required".to_string(),
        });
    }
    password::validate_password(&request.password, &state.config.auth.password)?;

    // Argon2 is CPU-bound
    let raw_password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&raw_password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let mut tx = state.db.begin().await.map_err(DbError::from)?;
    let user = Users::new(&mut tx)
        .create(&UserCreateDBRequest {
            username,
            email,
            password_hash: Some(password_hash),
            is_admin: false,
        })
        .await?;
    Settings::new(&mut tx).get_or_create(user.id).await?;
    tx.commit().await.map_err(DbError::from)?;

    start_session(&state, user, StatusCode::CREATED, "Registration successful")
}

/// Log in with username (or email) and password
#[utoipa::path(
    post,
    path = "/authentication/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<SessionResponse> {
    let user = {
        let mut conn = state.db.acquire().await.map_err(DbError::from)?;
        Users::new(&mut conn)
            .get_user_by_login(request.username.trim())
            .await?
            .ok_or_else(invalid_credentials)?
    };

    let hash = user.password_hash.clone().ok_or_else(invalid_credentials)?;
    let raw_password = request.password;
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&raw_password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(invalid_credentials());
    }

    start_session(&state, user, StatusCode::OK, "Login successful")
}

/// Log out by clearing the session cookie
#[utoipa::path(
    post,
    path = "/authentication/logout",
    tag = "authentication",
    responses(
        (status = 200, description = "Logout successful"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, session::clear_session_cookie(&state.config))],
        Json(ApiResponse::with_message((), "Logout successful")),
    )
}

/// The authenticated user's profile
#[utoipa::path(
    get,
    path = "/authentication/me",
    tag = "authentication",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Account no longer exists"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<ApiResponse<UserResponse>>> {
    let mut conn = state.db.acquire().await.map_err(DbError::from)?;
    let user = Users::new(&mut conn).get_by_id(current_user.id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: current_user.id.to_string(),
    })?;

    Ok(Json(ApiResponse::ok(user.into())))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_test_app, create_test_state, create_test_server};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_login_me_logout(pool: SqlitePool) {
        let server = create_test_app(pool);

        let response = server
            .post("/authentication/register")
            .json(&json!({"username": "maker", "email": "Maker@Example.com", "password": "password123"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert!(response.header("set-cookie").to_str().unwrap().starts_with("provokely_session="));
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["email"], "maker@example.com");

        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "maker@example.com", "password": "password123"}))
            .await;
        response.assert_status_ok();
        let token = response.json::<Value>()["data"]["access_token"].as_str().unwrap().to_string();

        let response = server.get("/authentication/me").authorization_bearer(&token).await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["data"]["username"], "maker");

        let response = server.post("/authentication/logout").await;
        response.assert_status_ok();
        assert!(response.header("set-cookie").to_str().unwrap().contains("Max-Age=0"));
    }

    #[sqlx::test]
    async fn test_bad_credentials(pool: SqlitePool) {
        let server = create_test_app(pool);
        server
            .post("/authentication/register")
            .json(&json!({"username": "maker", "email": "maker@example.com", "password": "password123"}))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post("/authentication/login")
            .json(&json!({"username": "maker", "password": "wrong-password"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "AUTH_FAILED");
        assert_eq!(body["error"]["message"], "Invalid username or password");

        server.get("/authentication/me").await.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_registration_rules(pool: SqlitePool) {
        let server = create_test_app(pool.clone());

        let response = server
            .post("/authentication/register")
            .json(&json!({"username": "maker", "email": "maker@example.com", "password": "short"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_ERROR");

        server
            .post("/authentication/register")
            .json(&json!({"username": "maker", "email": "maker@example.com", "password": "password123"}))
            .await
            .assert_status(StatusCode::CREATED);
        let response = server
            .post("/authentication/register")
            .json(&json!({"username": "maker", "email": "other@example.com", "password": "password123"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);

        let mut state = create_test_state(pool);
        state.config.auth.allow_registration = false;
        let server = create_test_server(state);
        server
            .post("/authentication/register")
            .json(&json!({"username": "late", "email": "late@example.com", "password": "password123"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
