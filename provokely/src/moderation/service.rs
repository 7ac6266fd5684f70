//! Comment moderation pipeline.
//!
//! [`ModerationService`] is created once at startup and shared through the application state. It
//! runs analysis, the reply decision, reply generation and (for Instagram) posting, then persists
//! the outcome. Database connections are only held for the short reads and writes around those
//! steps; none is held while the LLM or the Graph API is being called.

use crate::config::Config;
use crate::db::errors::DbError;
use crate::db::handlers::{Comments, InstagramAccounts, Notifications, Posts, Repository, Settings};
use crate::db::models::comments::{CommentDBResponse, CommentUpdateDBRequest, CommentUpsertDBRequest};
use crate::db::models::instagram::{InstagramAccountDBResponse, InstagramAccountUpdateDBRequest};
use crate::db::models::posts::{PostCreateDBRequest, PostDBResponse};
use crate::errors::{Error, Result};
use crate::llm::ChatClient;
use crate::moderation::policy::decide;
use crate::moderation::responses::ResponseGenerator;
use crate::moderation::sentiment::{SentimentAnalyzer, SentimentResult};
use crate::notifications::{NotificationEvent, NotificationHub};
use crate::platforms::instagram::should_refresh_token;
use crate::platforms::{GraphComment, InstagramApi, PlatformError};
use crate::types::{CommentId, InstagramAccountId, Platform, UserId, abbrev_uuid};
use chrono::Utc;
use metrics::counter;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// A comment to run through the pipeline.
#[derive(Debug, Clone)]
pub struct IncomingComment {
    pub user_id: UserId,
    pub platform: Platform,
    pub external_id: String,
    pub post_external_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ProcessedComment {
    pub comment: CommentDBResponse,
    pub sentiment: SentimentResult,
    pub ai_response: Option<String>,
    pub requires_approval: bool,
    /// False when the comment had been seen before
    pub created: bool,
}

/// Result of an approve or decline action.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    pub comment: CommentDBResponse,
    pub message: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub fetched: usize,
    pub created: usize,
}

#[derive(Clone)]
pub struct ModerationService {
    db: SqlitePool,
    analyzer: SentimentAnalyzer,
    generator: ResponseGenerator,
    instagram: Arc<dyn InstagramApi>,
    hub: NotificationHub,
    refresh_margin: Duration,
}

impl ModerationService {
    pub fn new(
        db: SqlitePool,
        config: &Config,
        llm: Option<Arc<dyn ChatClient>>,
        instagram: Arc<dyn InstagramApi>,
        hub: NotificationHub,
    ) -> Self {
        Self {
            db,
            analyzer: SentimentAnalyzer::new(llm.clone(), config.openai.model.clone()),
            generator: ResponseGenerator::new(llm, config.openai.model.clone()),
            instagram,
            hub,
            refresh_margin: config.instagram.refresh_margin,
        }
    }

    pub fn analyzer(&self) -> &SentimentAnalyzer {
        &self.analyzer
    }

    pub fn instagram(&self) -> &Arc<dyn InstagramApi> {
        &self.instagram
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Analyze a comment, decide on a reply, optionally post it, and upsert the result.
    ///
    /// Replays of a comment whose reply was already posted or reviewed keep their moderation
    /// fields, so nothing is posted twice and a decided comment never goes back to pending.
    #[instrument(skip_all, fields(user_id = %abbrev_uuid(&incoming.user_id), platform = %incoming.platform, external_id = %incoming.external_id))]
    pub async fn process_comment(&self, incoming: IncomingComment) -> Result<ProcessedComment> {
        let sentiment = self.analyzer.analyze(&incoming.content).await;

        let (settings, existing) = {
            let mut conn = self.db.acquire().await.map_err(DbError::from)?;
            let settings = Settings::new(&mut conn).get_or_create(incoming.user_id).await?;
            let existing = Comments::new(&mut conn)
                .get_by_external_id(incoming.platform, &incoming.external_id)
                .await?;
            (settings, existing)
        };

        if let Some(existing) = &existing
            && existing.user_id != incoming.user_id
        {
            return Err(Error::Conflict {
                message: "Comment is already tracked by another account".to_string(),
            });
        }

        let settled = existing.as_ref().filter(|c| c.response_posted || c.approved.is_some());
        let decision = decide(&settings, sentiment.label, incoming.platform);

        let (ai_response, response_posted, requires_approval) = match (settled, existing.as_ref()) {
            (Some(previous), _) => {
                debug!("Comment already decided, keeping its reply state");
                (previous.ai_response.clone(), previous.response_posted, previous.requires_approval)
            }
            (None, Some(previous)) if !decision.should_respond => {
                debug!("No reply wanted for this replay, keeping the stored reply state");
                (previous.ai_response.clone(), previous.response_posted, previous.requires_approval)
            }
            (None, _) => {
                let reply = if decision.should_respond {
                    Some(self.generator.generate(&sentiment, incoming.platform, &incoming.content).await)
                } else {
                    None
                };

                let mut posted = false;
                if let (true, Some(text)) = (decision.post_now, reply.as_deref()) {
                    match self.post_reply(incoming.user_id, &incoming.external_id, text).await {
                        Ok(()) => posted = true,
                        Err(e) => warn!("Automatic reply was not posted: {e}"),
                    }
                }
                (reply, posted, decision.requires_approval)
            }
        };

        let request = CommentUpsertDBRequest {
            user_id: incoming.user_id,
            platform: incoming.platform,
            external_id: incoming.external_id,
            post_external_id: incoming.post_external_id,
            content: incoming.content,
            sentiment_score: Some(sentiment.score),
            sentiment_label: Some(sentiment.label),
            nuanced_label: Some(sentiment.nuanced_label),
            ai_response,
            response_posted,
            requires_approval,
        };

        let (comment, created) = {
            let mut conn = self.db.acquire().await.map_err(DbError::from)?;
            Comments::new(&mut conn).upsert(&request).await?
        };

        counter!("provokely_comments_processed_total", "label" => sentiment.label.as_str()).increment(1);
        info!(
            comment_id = %abbrev_uuid(&comment.id),
            label = %sentiment.label,
            posted = comment.response_posted,
            requires_approval = comment.requires_approval,
            "Processed comment"
        );

        // The stored row wins: a concurrent approve or decline may have settled it meanwhile.
        Ok(ProcessedComment {
            ai_response: comment.ai_response.clone(),
            requires_approval: comment.requires_approval,
            comment,
            sentiment,
            created,
        })
    }

    /// Re-run sentiment analysis on a stored comment and save the new classification.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), comment_id = %abbrev_uuid(&comment_id)))]
    pub async fn analyze_comment_sentiment(&self, user_id: UserId, comment_id: CommentId) -> Result<(CommentDBResponse, SentimentResult)> {
        let comment = self.owned_comment(user_id, comment_id).await?;
        let sentiment = self.analyzer.analyze(&comment.content).await;

        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        let updated = Comments::new(&mut conn)
            .update(
                comment.id,
                &CommentUpdateDBRequest {
                    sentiment_score: Some(sentiment.score),
                    sentiment_label: Some(sentiment.label),
                    nuanced_label: Some(sentiment.nuanced_label),
                    ..Default::default()
                },
            )
            .await?;

        Ok((updated, sentiment))
    }

    pub async fn create_post(&self, request: &PostCreateDBRequest) -> Result<(PostDBResponse, bool)> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        Ok(Posts::new(&mut conn).get_or_create(request).await?)
    }

    /// Post the reply to a pending comment. `reply` overrides the stored AI response.
    #[instrument(skip(self, reply), fields(user_id = %abbrev_uuid(&user_id), comment_id = %abbrev_uuid(&comment_id)))]
    pub async fn approve(&self, user_id: UserId, comment_id: CommentId, reply: Option<String>) -> Result<ReviewOutcome> {
        let comment = self.owned_comment(user_id, comment_id).await?;
        if comment.response_posted {
            return Ok(ReviewOutcome {
                comment,
                message: "Reply already posted",
            });
        }
        if comment.platform != Platform::Instagram {
            return Err(Error::UnsupportedPlatform {
                platform: comment.platform,
            });
        }

        let text = reply
            .or_else(|| comment.ai_response.clone())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::BadRequest {
                message: "Reply text is required".to_string(),
            })?;

        self.post_reply(user_id, &comment.external_id, &text).await?;

        let comment = {
            let mut tx = self.db.begin().await.map_err(DbError::from)?;
            let updated = Comments::new(&mut tx)
                .update(
                    comment.id,
                    &CommentUpdateDBRequest {
                        ai_response: Some(text.clone()),
                        response_posted: Some(true),
                        requires_approval: Some(false),
                        approved: Some(true),
                        ..Default::default()
                    },
                )
                .await?;
            Notifications::new(&mut tx)
                .resolve(user_id, updated.platform, &updated.external_id, Some(&text))
                .await?;
            tx.commit().await.map_err(DbError::from)?;
            updated
        };

        self.publish_unread(user_id).await;
        Ok(ReviewOutcome {
            comment,
            message: "Reply posted",
        })
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), comment_id = %abbrev_uuid(&comment_id)))]
    pub async fn decline(&self, user_id: UserId, comment_id: CommentId) -> Result<ReviewOutcome> {
        let comment = self.owned_comment(user_id, comment_id).await?;
        if comment.response_posted {
            return Ok(ReviewOutcome {
                comment,
                message: "Already replied; cannot decline",
            });
        }

        let comment = {
            let mut tx = self.db.begin().await.map_err(DbError::from)?;
            let updated = Comments::new(&mut tx)
                .update(
                    comment.id,
                    &CommentUpdateDBRequest {
                        requires_approval: Some(false),
                        approved: Some(false),
                        ..Default::default()
                    },
                )
                .await?;
            Notifications::new(&mut tx)
                .resolve(user_id, updated.platform, &updated.external_id, None)
                .await?;
            tx.commit().await.map_err(DbError::from)?;
            updated
        };

        self.publish_unread(user_id).await;
        Ok(ReviewOutcome {
            comment,
            message: "Declined",
        })
    }

    /// Import the account's recent media as posts.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), account_id = %abbrev_uuid(&account_id)))]
    pub async fn sync_posts(&self, user_id: UserId, account_id: InstagramAccountId) -> Result<SyncOutcome> {
        let account = self.owned_account(user_id, account_id).await?;
        let token = self.fresh_token(&account).await;
        let media = self
            .instagram
            .fetch_media(&account.instagram_user_id, &token)
            .await
            .map_err(upstream)?;

        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        let mut posts = Posts::new(&mut conn);
        let mut created = 0;
        for item in &media {
            let (_, is_new) = posts
                .get_or_create(&PostCreateDBRequest {
                    user_id,
                    platform: Platform::Instagram,
                    external_id: item.id.clone(),
                    content: item.caption.clone().unwrap_or_default(),
                    author: Some(account.username.clone()),
                    url: item.permalink.clone(),
                })
                .await?;
            created += usize::from(is_new);
        }

        info!(fetched = media.len(), created, "Synced Instagram posts");
        Ok(SyncOutcome {
            fetched: media.len(),
            created,
        })
    }

    /// Fetch the comments of one media item and run each through [`process_comment`](Self::process_comment).
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id), account_id = %abbrev_uuid(&account_id)))]
    pub async fn sync_comments(&self, user_id: UserId, account_id: InstagramAccountId, media_id: &str) -> Result<Vec<ProcessedComment>> {
        let account = self.owned_account(user_id, account_id).await?;
        let token = self.fresh_token(&account).await;
        let comments = self.instagram.fetch_comments(media_id, &token).await.map_err(upstream)?;

        let mut processed = Vec::with_capacity(comments.len());
        for GraphComment { id, text, .. } in comments {
            let Some(text) = text else {
                debug!(comment_id = %id, "Skipping comment without text");
                continue;
            };
            processed.push(
                self.process_comment(IncomingComment {
                    user_id,
                    platform: Platform::Instagram,
                    external_id: id,
                    post_external_id: Some(media_id.to_string()),
                    content: text,
                })
                .await?,
            );
        }

        Ok(processed)
    }

    /// Reply on Instagram with the user's active account.
    async fn post_reply(&self, user_id: UserId, comment_external_id: &str, text: &str) -> Result<()> {
        let account = {
            let mut conn = self.db.acquire().await.map_err(DbError::from)?;
            InstagramAccounts::new(&mut conn).get_active_for_user(user_id).await?
        }
        .ok_or(Error::NotConnected {
            platform: Platform::Instagram,
        })?;

        let token = self.fresh_token(&account).await;
        let reply_id = self
            .instagram
            .reply_to_comment(comment_external_id, text, &token)
            .await
            .map_err(|e| Error::PostFailed { message: e.to_string() })?;

        counter!("provokely_replies_posted_total").increment(1);
        debug!(%reply_id, "Posted reply");
        Ok(())
    }

    /// The account's token, exchanged for a new one first when it is close to expiry. A failed
    /// exchange falls back to the current token.
    async fn fresh_token(&self, account: &InstagramAccountDBResponse) -> String {
        if !should_refresh_token(account, self.refresh_margin, Utc::now()) {
            return account.access_token.clone();
        }

        let exchanged = match self.instagram.exchange_token(&account.access_token).await {
            Ok(exchanged) => exchanged,
            Err(e) => {
                warn!(account = %account.username, "Token refresh failed, using current token: {e}");
                return account.access_token.clone();
            }
        };

        let update = InstagramAccountUpdateDBRequest {
            access_token: Some(exchanged.access_token.clone()),
            expires_in: exchanged.expires_in,
            ..Default::default()
        };
        let saved = match self.db.acquire().await {
            Ok(mut conn) => InstagramAccounts::new(&mut conn).update(account.id, &update).await.map(|_| ()),
            Err(e) => Err(DbError::from(e)),
        };
        if let Err(e) = saved {
            warn!(account = %account.username, "Refreshed token could not be saved: {e}");
        } else {
            info!(account = %account.username, "Refreshed Instagram access token");
        }

        exchanged.access_token
    }

    pub(crate) async fn publish_unread(&self, user_id: UserId) {
        if self.hub.subscriber_count(user_id) == 0 {
            return;
        }
        let unread = match self.db.acquire().await {
            Ok(mut conn) => Notifications::new(&mut conn).unread_count(user_id).await,
            Err(e) => Err(DbError::from(e)),
        };
        match unread {
            Ok(unread_count) => {
                self.hub.publish(
                    user_id,
                    NotificationEvent {
                        unread_count,
                        latest: None,
                    },
                );
            }
            Err(e) => warn!("Could not count unread notifications: {e}"),
        }
    }

    pub(crate) async fn owned_comment(&self, user_id: UserId, comment_id: CommentId) -> Result<CommentDBResponse> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        Comments::new(&mut conn)
            .get_by_id(comment_id)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| Error::NotFound {
                resource: "Comment".to_string(),
                id: comment_id.to_string(),
            })
    }

    pub(crate) async fn owned_account(&self, user_id: UserId, account_id: InstagramAccountId) -> Result<InstagramAccountDBResponse> {
        let mut conn = self.db.acquire().await.map_err(DbError::from)?;
        InstagramAccounts::new(&mut conn)
            .get_by_id(account_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| Error::NotFound {
                resource: "Instagram account".to_string(),
                id: account_id.to_string(),
            })
    }
}

fn upstream(e: PlatformError) -> Error {
    Error::Upstream {
        service: "Instagram".to_string(),
        message: e.to_string(),
    }
}
