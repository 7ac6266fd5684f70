//! Reply text generation.

use crate::llm::{ChatClient, ChatMessage, ChatRequest};
use crate::moderation::sentiment::SentimentResult;
use crate::types::{Platform, SentimentLabel};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Replies are cut to this many words, then to [`MAX_REPLY_CHARS`].
pub const MAX_REPLY_WORDS: usize = 18;
pub const MAX_REPLY_CHARS: usize = 140;

const REPLY_PROMPT: &str = "\
You write ultra-short, high-impact replies to Instagram comments to maximize engagement.
Constraints:
- Output only the reply, no preamble.
- At most 18 words.
- No slurs, harassment or threats. PG-13 and platform-safe.
Styles by sentiment:
- positive: warm and human, include ❤ or similar.
- negative/hate: edgy clapback, slightly contemptuous but safe; mostly statements, occasionally a short tag-question.";

fn default_templates() -> HashMap<SentimentLabel, Vec<String>> {
    let templates: [(SentimentLabel, &[&str]); 4] = [
        (
            SentimentLabel::Positive,
            &[
                "Thank you for your positive feedback! 😊",
                "We're so glad you enjoyed it! ❤️",
                "Your support means everything to us! 🙏",
            ],
        ),
        (
            SentimentLabel::Negative,
            &[
                "We appreciate your feedback and will work to improve.",
                "Thank you for sharing your concerns. We're here to help!",
                "We're sorry to hear that. Please let us know how we can make it better.",
            ],
        ),
        (
            SentimentLabel::Neutral,
            &[
                "Thanks for sharing your thoughts!",
                "We appreciate your comment!",
                "Thank you for engaging with us!",
            ],
        ),
        (
            SentimentLabel::Hate,
            &[
                "Interesting perspective! 🤔 What made you feel this way?",
                "Wow, that's quite the opinion! 😅 Care to elaborate?",
                "That's... creative! 🎨 Tell me more about your thought process.",
            ],
        ),
    ];

    templates
        .into_iter()
        .map(|(label, lines)| (label, lines.iter().map(|s| s.to_string()).collect()))
        .collect()
}

fn style_hint(label: SentimentLabel) -> &'static str {
    match label {
        SentimentLabel::Positive => "Style: short, warm, appreciative with ❤.",
        SentimentLabel::Hate | SentimentLabel::Negative => {
            "Style: edgy clapback, witty roast, human and safe; prefer statements; end without a question unless it's a short tag."
        }
        SentimentLabel::Neutral => "Style: concise, friendly.",
    }
}

/// Truncate to [`MAX_REPLY_WORDS`] words, then [`MAX_REPLY_CHARS`] characters.
pub fn truncate_reply(reply: &str) -> String {
    let words: Vec<&str> = reply.split_whitespace().collect();
    let reply = if words.len() > MAX_REPLY_WORDS {
        words[..MAX_REPLY_WORDS].join(" ")
    } else {
        reply.trim().to_string()
    };
    reply.chars().take(MAX_REPLY_CHARS).collect()
}

#[derive(Clone)]
pub struct ResponseGenerator {
    client: Option<Arc<dyn ChatClient>>,
    model: String,
    templates: HashMap<SentimentLabel, Vec<String>>,
}

impl ResponseGenerator {
    pub fn new(client: Option<Arc<dyn ChatClient>>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            templates: default_templates(),
        }
    }

    /// Replace the templates of one label. An empty list is ignored.
    pub fn customize_templates(&mut self, label: SentimentLabel, templates: Vec<String>) {
        if !templates.is_empty() {
            self.templates.insert(label, templates);
        }
    }

    /// First template for the label (neutral when a label has none).
    pub fn template_for(&self, label: SentimentLabel) -> String {
        self.templates
            .get(&label)
            .or_else(|| self.templates.get(&SentimentLabel::Neutral))
            .and_then(|lines| lines.first())
            .cloned()
            .unwrap_or_else(|| "Thanks for sharing your thoughts!".to_string())
    }

    /// Produce a reply. Uses the LLM when configured and `comment_text` is non-blank; otherwise,
    /// or on any failure, the label's template.
    #[instrument(skip_all, fields(label = %sentiment.label, %platform))]
    pub async fn generate(&self, sentiment: &SentimentResult, platform: Platform, comment_text: &str) -> String {
        if let Some(client) = &self.client
            && !comment_text.trim().is_empty()
        {
            let request = ChatRequest {
                model: self.model.clone(),
                messages: vec![
                    ChatMessage::system(REPLY_PROMPT),
                    ChatMessage::user(format!(
                        "Original comment (reply in same language): {comment_text}\nPrimary: {}\nNuanced: {}\n{}",
                        sentiment.label,
                        sentiment.nuanced_label,
                        style_hint(sentiment.label)
                    )),
                ],
                temperature: Some(0.7),
                max_tokens: None,
            };

            match client.complete(request).await {
                Ok(completion) => {
                    let reply = truncate_reply(&completion.content);
                    if !reply.is_empty() {
                        return reply;
                    }
                    warn!("LLM returned an empty reply, using template");
                }
                Err(e) => warn!("Reply generation failed, using template: {e}"),
            }
        }

        self.template_for(sentiment.label)
    }

    /// Same as [`generate`](Self::generate); post content is accepted for callers that have it.
    pub async fn generate_with_context(
        &self,
        sentiment: &SentimentResult,
        platform: Platform,
        comment_text: &str,
        _post_content: Option<&str>,
    ) -> String {
        self.generate(sentiment, platform, comment_text).await
    }
}
