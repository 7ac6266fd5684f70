//! Reply and notification decisions for an analyzed comment.

use crate::db::models::settings::UserSettings;
use crate::moderation::sentiment::SentimentResult;
use crate::types::{NuancedLabel, Platform, SentimentLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyDecision {
    /// Generate a reply at all
    pub should_respond: bool,
    /// Post the reply immediately
    pub post_now: bool,
    /// Hold the reply until the owner approves it
    pub requires_approval: bool,
}

/// Decide what happens to a comment with this label.
///
/// Replies are only posted automatically when auto-commenting is on and the label doesn't need
/// approval. Automatic posting is Instagram-only.
pub fn decide(settings: &UserSettings, label: SentimentLabel, platform: Platform) -> ReplyDecision {
    let should_respond = settings.auto_respond_to(label);
    let auto = settings.auto_comment_enabled;
    let needs_approval = auto && settings.require_approval_for(label);

    ReplyDecision {
        should_respond,
        post_now: should_respond && auto && !needs_approval && platform == Platform::Instagram,
        requires_approval: should_respond && needs_approval,
    }
}

/// Whether the owner wants an inbox entry for this comment.
pub fn should_notify(settings: &UserSettings, sentiment: &SentimentResult) -> bool {
    settings.notify_on(sentiment.label)
        || (sentiment.nuanced_label == NuancedLabel::BuyingDesire && settings.notify_on_purchase_intent)
        || (sentiment.nuanced_label == NuancedLabel::Question && settings.notify_on_question)
}
