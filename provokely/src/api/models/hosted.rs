//! API request/response models for the hosted AI-proxy API.
//!
//! These endpoints serve a JavaScript client and use camelCase field names.

use crate::billing::pricing::from_units;
use crate::db::models::api_users::{ApiUserDBResponse, UsageLogDBResponse};
use crate::types::{ApiUserId, UsageLogId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HostedAuthRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostedAccountResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ApiUserId,
    pub email: String,
    pub is_pro: bool,
    pub projects_remaining: i64,
    pub total_requests: i64,
    pub total_tokens_used: i64,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_cost: Decimal,
}

impl From<ApiUserDBResponse> for HostedAccountResponse {
    fn from(db: ApiUserDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            is_pro: db.is_pro,
            projects_remaining: db.projects_remaining,
            total_requests: db.total_requests,
            total_tokens_used: db.total_tokens_used,
            total_cost: from_units(db.total_cost_units),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HostedAuthResponse {
    pub token: String,
    pub user: HostedAccountResponse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiRequest {
    pub prompt: String,
    /// Must match the account the bearer token was issued for
    pub email: String,
    #[serde(default)]
    pub is_new_project: bool,
    #[serde(default)]
    pub options: AiOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    pub response: String,
    pub tokens_used: i64,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub cost: Decimal,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SubscriptionStatusQuery {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusResponse {
    pub is_pro: bool,
    pub projects_remaining: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageLogResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: UsageLogId,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub tokens_used: i64,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub cost: Decimal,
    pub model: String,
    pub prompt_length: i64,
}

impl From<UsageLogDBResponse> for UsageLogResponse {
    fn from(db: UsageLogDBResponse) -> Self {
        Self {
            id: db.id,
            timestamp: db.timestamp,
            action: db.action,
            tokens_used: db.tokens_used,
            cost: from_units(db.cost_units),
            model: db.model,
            prompt_length: db.prompt_length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ai_request_defaults() {
        let request: AiRequest = serde_json::from_value(json!({"prompt": "hi", "email": "a@b.c"})).unwrap();
        assert!(!request.is_new_project);
        assert!(request.options.model.is_none());

        let request: AiRequest = serde_json::from_value(json!({
            "prompt": "hi",
            "email": "a@b.c",
            "isNewProject": true,
            "options": {"model": "gpt-4o", "maxTokens": 200}
        }))
        .unwrap();
        assert!(request.is_new_project);
        assert_eq!(request.options.max_tokens, Some(200));
    }

    #[test]
    fn test_cost_serializes_as_number() {
        let response = AiResponse {
            response: "ok".to_string(),
            tokens_used: 1234,
            cost: Decimal::new(370, 4),
        };
        assert_eq!(
            serde_json::to_value(response).unwrap(),
            json!({"response": "ok", "tokensUsed": 1234, "cost": 0.037})
        );
    }
}
