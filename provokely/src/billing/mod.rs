//! Metering for the hosted AI proxy.
//!
//! Each proxied generation is checked against the caller's project allowance, sent to the chat
//! model, priced ([`pricing`]) and written to the usage log together with the account totals.
//! Pro status is mirrored from the billing provider and only read here.

pub mod pricing;

use crate::config::HostedApiConfig;
use crate::db::errors::DbError;
use crate::db::handlers::ApiUsers;
use crate::db::models::api_users::{ApiUserDBResponse, UsageLogCreateDBRequest};
use crate::errors::{Error, Result};
use crate::llm::{ChatClient, ChatMessage, ChatRequest};
use crate::types::abbrev_uuid;
use metrics::counter;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::{info, instrument};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Usage log action for proxied generations.
pub const GENERATION_ACTION: &str = "ai_generation";

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub email: String,
    pub is_new_project: bool,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub response: String,
    pub tokens_used: i64,
    pub cost: Decimal,
    pub model: String,
}

/// Run one metered generation for `user`.
///
/// A new project spends one unit of the allowance before the model is called; pro accounts are
/// never limited.
#[instrument(skip_all, fields(api_user_id = %abbrev_uuid(&user.id), new_project = request.is_new_project))]
pub async fn generate(
    db: &SqlitePool,
    llm: Option<&dyn ChatClient>,
    config: &HostedApiConfig,
    user: &ApiUserDBResponse,
    request: GenerationRequest,
) -> Result<Generation> {
    if request.email.trim().to_lowercase() != user.email {
        return Err(Error::Forbidden {
            message: "Email does not match the authenticated account".to_string(),
        });
    }

    let llm = llm.ok_or_else(|| Error::Upstream {
        service: "OpenAI".to_string(),
        message: "no API key configured".to_string(),
    })?;

    if request.is_new_project && !user.is_pro {
        let mut conn = db.acquire().await.map_err(DbError::from)?;
        if !ApiUsers::new(&mut conn).consume_project(user.id).await? {
            return Err(Error::LimitReached {
                message: "No projects remaining. Upgrade to Pro for unlimited projects.".to_string(),
            });
        }
    }

    let model = request.model.unwrap_or_else(|| pricing::DEFAULT_MODEL.to_string());
    let completion = llm
        .complete(ChatRequest {
            model: model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(request.prompt.clone())],
            temperature: None,
            max_tokens: Some(request.max_tokens.unwrap_or(config.default_max_tokens)),
        })
        .await
        .map_err(|e| Error::Upstream {
            service: "OpenAI".to_string(),
            message: e.to_string(),
        })?;

    let cost = pricing::cost_for(&model, completion.total_tokens);

    let mut conn = db.acquire().await.map_err(DbError::from)?;
    ApiUsers::new(&mut conn)
        .record_usage(&UsageLogCreateDBRequest {
            api_user_id: user.id,
            action: GENERATION_ACTION.to_string(),
            tokens_used: completion.total_tokens,
            cost_units: pricing::to_units(cost),
            model: model.clone(),
            prompt_length: request.prompt.chars().count() as i64,
        })
        .await?;

    counter!("provokely_ai_tokens_total", "model" => model.clone()).increment(completion.total_tokens.max(0) as u64);
    info!(tokens = completion.total_tokens, %cost, "Metered generation");

    Ok(Generation {
        response: completion.content,
        tokens_used: completion.total_tokens,
        cost,
        model,
    })
}
