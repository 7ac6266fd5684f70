//! Instagram webhook ingestion.
//!
//! Meta delivers `{"object": "instagram", "entry": [{"id": <ig user id>, "time": .., "changes":
//! [{"field": "comments", "value": {..}}]}]}`. Every change is logged once in
//! `instagram_webhooks`; `comments` changes are also run through the moderation pipeline and may
//! produce an inbox notification.

use crate::db::errors::DbError;
use crate::db::handlers::{InstagramAccounts, Notifications, Settings, WebhookRecords};
use crate::db::models::instagram::{InstagramAccountDBResponse, WebhookRecordCreateDBRequest};
use crate::db::models::notifications::NotificationUpsertDBRequest;
use crate::errors::Result;
use crate::moderation::policy::should_notify;
use crate::moderation::service::{IncomingComment, ModerationService};
use crate::notifications::{LatestNotification, NotificationEvent};
use crate::types::Platform;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// One `entry[].changes[]` element, flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookChange {
    pub instagram_user_id: String,
    pub event_type: String,
    pub comment_id: Option<String>,
    pub media_id: Option<String>,
    pub text: Option<String>,
    /// Dedup key: comment id, else media id, else `{timestamp}-{event_type}`
    pub webhook_id: String,
    pub raw: Value,
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Flatten a webhook body into its changes. Malformed parts are skipped.
pub fn parse_changes(payload: &Value) -> Vec<WebhookChange> {
    let Some(entries) = payload.get("entry").and_then(Value::as_array) else {
        return Vec::new();
    };

    let null = Value::Null;
    let mut changes = Vec::new();
    for entry in entries {
        let Some(instagram_user_id) = string_at(entry, "/id") else {
            debug!("Skipping webhook entry without an account id");
            continue;
        };
        let timestamp = string_at(entry, "/time").unwrap_or_else(|| Utc::now().timestamp().to_string());

        for change in entry.get("changes").and_then(Value::as_array).into_iter().flatten() {
            let event_type = string_at(change, "/field").unwrap_or_else(|| "instagram".to_string());
            let value = change.get("value").unwrap_or(&null);
            let comment_id = string_at(value, "/id").or_else(|| string_at(value, "/comment_id"));
            let media_id = string_at(value, "/media/id").or_else(|| string_at(value, "/media_id"));
            let webhook_id = comment_id
                .clone()
                .or_else(|| media_id.clone())
                .unwrap_or_else(|| format!("{timestamp}-{event_type}"));

            changes.push(WebhookChange {
                instagram_user_id: instagram_user_id.clone(),
                event_type,
                comment_id,
                media_id,
                text: string_at(value, "/text"),
                webhook_id,
                raw: change.clone(),
            });
        }
    }
    changes
}

impl ModerationService {
    /// Store each change of a webhook body once. Returns the number of new records.
    #[instrument(skip_all)]
    pub async fn store_instagram_webhook(&self, payload: &Value) -> Result<usize> {
        let mut created = 0;
        for change in parse_changes(payload) {
            if let Some((_, true)) = self.record_change(&change).await? {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Store and process each change of a webhook body. Returns the number of new records.
    ///
    /// Failures on one change are logged and do not stop the others.
    #[instrument(skip_all)]
    pub async fn handle_instagram_webhook(&self, payload: &Value) -> Result<usize> {
        let mut created = 0;
        for change in parse_changes(payload) {
            let Some((account, is_new)) = self.record_change(&change).await? else {
                continue;
            };
            created += usize::from(is_new);

            if change.event_type == "comments" {
                if let Err(e) = self.handle_comment_change(&account, &change).await {
                    warn!(webhook_id = %change.webhook_id, "Failed to process comment webhook: {e}");
                    continue;
                }
                let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
                WebhookRecords::new(&mut conn)
                    .mark_processed_by_webhook_id(&change.webhook_id)
                    .await?;
            }
        }

        info!(created, "Handled Instagram webhook");
        Ok(created)
    }

    /// Resolve the account and insert the record. `None` when the account is unknown; otherwise
    /// the account and whether the record is new.
    async fn record_change(&self, change: &WebhookChange) -> Result<Option<(InstagramAccountDBResponse, bool)>> {
        let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
        let Some(account) = InstagramAccounts::new(&mut conn)
            .get_by_instagram_user_id(&change.instagram_user_id)
            .await?
        else {
            debug!(instagram_user_id = %change.instagram_user_id, "Webhook for unknown account, skipping");
            return Ok(None);
        };

        let inserted = WebhookRecords::new(&mut conn)
            .insert_once(&WebhookRecordCreateDBRequest {
                webhook_id: change.webhook_id.clone(),
                account_id: account.id,
                event_type: change.event_type.clone(),
                payload: change.raw.clone(),
            })
            .await?;

        Ok(Some((account, inserted.is_some())))
    }

    async fn handle_comment_change(&self, account: &InstagramAccountDBResponse, change: &WebhookChange) -> Result<()> {
        let Some(comment_id) = &change.comment_id else {
            debug!("Comment webhook without a comment id");
            return Ok(());
        };

        // the webhook text can be truncated, prefer the Graph copy
        let detail = match self.instagram().fetch_comment(comment_id, &account.access_token).await {
            Ok(detail) => Some(detail),
            Err(e) => {
                warn!(%comment_id, "Could not fetch comment detail, using webhook text: {e}");
                None
            }
        };
        let text = detail
            .as_ref()
            .and_then(|d| d.text.clone())
            .or_else(|| change.text.clone());
        let Some(text) = text else {
            debug!(%comment_id, "Comment webhook without text");
            return Ok(());
        };
        let media_id = change
            .media_id
            .clone()
            .or_else(|| detail.and_then(|d| d.media).map(|m| m.id));

        let processed = self
            .process_comment(IncomingComment {
                user_id: account.user_id,
                platform: Platform::Instagram,
                external_id: comment_id.clone(),
                post_external_id: media_id.clone(),
                content: text.clone(),
            })
            .await?;

        let mut conn = self.pool().acquire().await.map_err(DbError::from)?;
        let settings = Settings::new(&mut conn).get_or_create(account.user_id).await?;
        if !should_notify(&settings, &processed.sentiment) && !processed.requires_approval {
            let unread_count = Notifications::new(&mut conn).unread_count(account.user_id).await?;
            drop(conn);
            self.hub().publish(
                account.user_id,
                NotificationEvent {
                    unread_count,
                    latest: None,
                },
            );
            return Ok(());
        }

        let mut notifications = Notifications::new(&mut conn);
        let notification = notifications
            .upsert(&NotificationUpsertDBRequest {
                user_id: account.user_id,
                platform: Platform::Instagram,
                external_id: comment_id.clone(),
                media_id,
                comment_text: text.clone(),
                sentiment_label: Some(processed.sentiment.label),
                needs_approval: processed.requires_approval,
                ai_response: processed.ai_response.clone(),
            })
            .await?;
        let unread_count = notifications.unread_count(account.user_id).await?;
        drop(conn);

        self.hub().publish(
            account.user_id,
            NotificationEvent {
                unread_count,
                latest: Some(LatestNotification {
                    id: notification.id,
                    text,
                    label: notification.sentiment_label,
                    needs_approval: notification.needs_approval,
                }),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::instagram::WebhookRecordFilter;
    use crate::db::handlers::notifications::NotificationFilter;
    use crate::db::models::settings::SettingsUpdateDBRequest;
    use crate::notifications::NotificationHub;
    use crate::test_utils::{FakeInstagram, create_test_config, create_test_instagram_account, create_test_user, graph_comment};
    use crate::types::SentimentLabel;
    use serde_json::json;
    use sqlx::SqlitePool;
    use std::sync::Arc;

    fn comment_payload(ig_id: &str, comment_id: &str, text: &str) -> Value {
        json!({
            "object": "instagram",
            "entry": [{
                "id": ig_id,
                "time": 1717000000,
                "changes": [{
                    "field": "comments",
                    "value": {"id": comment_id, "text": text, "media": {"id": "m1"}}
                }]
            }]
        })
    }

    #[test]
    fn test_parse_changes_ids_and_fallbacks() {
        let payload = json!({
            "entry": [
                {
                    "id": "1789",
                    "time": 1717000000,
                    "changes": [
                        {"field": "comments", "value": {"comment_id": "c9", "media_id": "m9", "text": "hi"}},
                        {"field": "mentions", "value": {"media_id": "m2"}},
                        {"value": {}}
                    ]
                },
                {"changes": [{"field": "comments", "value": {"id": "c1"}}]}
            ]
        });

        let changes = parse_changes(&payload);
        assert_eq!(changes.len(), 3);

        assert_eq!(changes[0].comment_id.as_deref(), Some("c9"));
        assert_eq!(changes[0].media_id.as_deref(), Some("m9"));
        assert_eq!(changes[0].webhook_id, "c9");
        assert_eq!(changes[0].text.as_deref(), Some("hi"));

        assert_eq!(changes[1].webhook_id, "m2");
        assert_eq!(changes[1].event_type, "mentions");

        assert_eq!(changes[2].event_type, "instagram");
        assert_eq!(changes[2].webhook_id, "1717000000-instagram");
    }

    #[test]
    fn test_parse_changes_rejects_garbage() {
        assert!(parse_changes(&json!({"object": "instagram"})).is_empty());
        assert!(parse_changes(&json!("nope")).is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_comment_webhook_creates_notification(pool: SqlitePool) {
        let user = create_test_user(&pool, "owner").await;
        create_test_instagram_account(&pool, user.id, "1789").await;
        let instagram = Arc::new(FakeInstagram {
            comments: vec![graph_comment("c1", "you are trash, idiot", "m1")],
            ..Default::default()
        });
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe(user.id);
        let service = ModerationService::new(pool.clone(), &create_test_config(), None, instagram, hub);

        // webhook text is stale; the Graph copy wins
        let created = service
            .handle_instagram_webhook(&comment_payload("1789", "c1", "hello"))
            .await
            .unwrap();
        assert_eq!(created, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.unread_count, 1);
        let latest = event.latest.unwrap();
        assert_eq!(latest.text, "you are trash, idiot");
        assert_eq!(latest.label, Some(SentimentLabel::Hate));

        let mut conn = pool.acquire().await.unwrap();
        let records = WebhookRecords::new(&mut conn)
            .list(&WebhookRecordFilter {
                user_id: user.id,
                account_id: None,
                processed: None,
                skip: 0,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].processed);
        assert_eq!(records[0].event_type, "comments");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_replayed_webhook_is_stored_once(pool: SqlitePool) {
        let user = create_test_user(&pool, "owner").await;
        create_test_instagram_account(&pool, user.id, "1789").await;
        let service = ModerationService::new(
            pool.clone(),
            &create_test_config(),
            None,
            Arc::new(FakeInstagram::default()),
            NotificationHub::new(),
        );

        let payload = comment_payload("1789", "c1", "terrible quality");
        assert_eq!(service.handle_instagram_webhook(&payload).await.unwrap(), 1);
        assert_eq!(service.handle_instagram_webhook(&payload).await.unwrap(), 0);

        let mut conn = pool.acquire().await.unwrap();
        let notifications = Notifications::new(&mut conn)
            .list(&NotificationFilter {
                user_id: user.id,
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].comment_text, "terrible quality");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_quiet_settings_skip_notification(pool: SqlitePool) {
        let user = create_test_user(&pool, "owner").await;
        create_test_instagram_account(&pool, user.id, "1789").await;
        {
            let mut conn = pool.acquire().await.unwrap();
            Settings::new(&mut conn)
                .update(
                    user.id,
                    &SettingsUpdateDBRequest {
                        notify_on_negative: Some(false),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        let hub = NotificationHub::new();
        let mut rx = hub.subscribe(user.id);
        let service = ModerationService::new(pool.clone(), &create_test_config(), None, Arc::new(FakeInstagram::default()), hub);

        service
            .handle_instagram_webhook(&comment_payload("1789", "c1", "terrible quality"))
            .await
            .unwrap();

        // Streams still get the unread count, without a latest entry
        let event = rx.recv().await.unwrap();
        assert_eq!(event.unread_count, 0);
        assert!(event.latest.is_none());

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(Notifications::new(&mut conn).unread_count(user.id).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_account_and_store_only(pool: SqlitePool) {
        let user = create_test_user(&pool, "owner").await;
        create_test_instagram_account(&pool, user.id, "1789").await;
        let service = ModerationService::new(
            pool.clone(),
            &create_test_config(),
            None,
            Arc::new(FakeInstagram::default()),
            NotificationHub::new(),
        );

        assert_eq!(
            service
                .handle_instagram_webhook(&comment_payload("0000", "c1", "great"))
                .await
                .unwrap(),
            0
        );

        assert_eq!(
            service
                .store_instagram_webhook(&comment_payload("1789", "c2", "great"))
                .await
                .unwrap(),
            1
        );
        let mut conn = pool.acquire().await.unwrap();
        let records = WebhookRecords::new(&mut conn)
            .list(&WebhookRecordFilter {
                user_id: user.id,
                account_id: None,
                processed: Some(false),
                skip: 0,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        let comments = crate::db::handlers::Comments::new(&mut conn)
            .get_by_external_id(Platform::Instagram, "c2")
            .await
            .unwrap();
        assert!(comments.is_none());
    }
}
