//! Bearer tokens for the hosted AI-proxy API.
//!
//! Hosted accounts are keyed by email only. `POST /api/auth` issues an HS256 token with the
//! `userId`, `email`, `exp` and `iat` claims; [`HostedUser`](crate::auth::current_user::HostedUser)
//! checks it on every proxied call.

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::auth::session::{is_client_error, secret};
use crate::config::Config;
use crate::db::models::api_users::ApiUserDBResponse;
use crate::errors::Error;
use crate::types::ApiUserId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedClaims {
    pub user_id: ApiUserId,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

pub fn create_hosted_token(user: &ApiUserDBResponse, config: &Config) -> Result<String, Error> {
    let now = Utc::now();
    let claims = HostedClaims {
        user_id: user.id,
        email: user.email.clone(),
        exp: (now + config.hosted.jwt_expiry).timestamp(),
        iat: now.timestamp(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret(config)?)).map_err(|e| Error::Internal {
        operation: format!("create hosted JWT: {e}"),
    })
}

pub fn verify_hosted_token(token: &str, config: &Config) -> Result<HostedClaims, Error> {
    let key = DecodingKey::from_secret(secret(config)?);

    decode::<HostedClaims>(token, &key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => Error::Unauthenticated {
                message: Some("Token expired".to_string()),
            },
            _ if is_client_error(&e) => Error::Unauthenticated {
                message: Some("Invalid token".to_string()),
            },
            _ => Error::Internal {
                operation: format!("hosted JWT verification: {e}"),
            },
        })
}

/// Split `Bearer <token>` exactly: one space, non-empty token, nothing after it.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?;
    (!token.is_empty() && !token.contains(' ')).then_some(token)
}
