//! Database models for hosted AI-proxy accounts and usage metering.
//!
//! Costs are stored as integer units of 1/10000 of a dollar; see [`crate::billing::pricing`].

use crate::types::{ApiUserId, UsageLogId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ApiUserDBResponse {
    pub id: ApiUserId,
    pub email: String,
    pub is_pro: bool,
    pub projects_remaining: i64,
    pub total_requests: i64,
    pub total_tokens_used: i64,
    pub total_cost_units: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UsageLogCreateDBRequest {
    pub api_user_id: ApiUserId,
    pub action: String,
    pub tokens_used: i64,
    pub cost_units: i64,
    pub model: String,
    pub prompt_length: i64,
}

/// Immutable once written.
#[derive(Debug, Clone, FromRow)]
pub struct UsageLogDBResponse {
    pub id: UsageLogId,
    pub api_user_id: ApiUserId,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub tokens_used: i64,
    pub cost_units: i64,
    pub model: String,
    pub prompt_length: i64,
}
