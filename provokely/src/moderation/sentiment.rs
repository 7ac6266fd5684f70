//! Comment sentiment classification.
//!
//! The LLM path asks for a strict JSON verdict and maps its category onto a primary
//! [`SentimentLabel`] and a [`NuancedLabel`]. Any failure along the way (no client, transport
//! error, unparseable output) degrades to [`classify_with_rules`], so [`SentimentAnalyzer::analyze`]
//! never fails.

use crate::llm::{ChatClient, ChatMessage, ChatRequest};
use crate::types::{NuancedLabel, SentimentLabel};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

const CLASSIFICATION_PROMPT: &str = "\
You are a multilingual sentiment classifier for social media comments.
For the comment you receive:
1. Detect its language (e.g. English, Spanish, Roman Urdu, Arabic).
2. Translate it into English without changing the meaning.
3. Classify it into exactly one category:
   - Positive (praise, appreciation, love, excitement)
   - Negative (criticism, disapproval, mocking, disappointment)
   - Neutral (informative, casual, unclear tone, unrelated)
   - Hate / Offensive (toxic, abusive, hateful, discriminatory)
   - Purchase Intent (interest in buying, asking the price)
   - Question / Clarification (asking for details)
Respond with strict JSON only:
{\"language\": \"<language>\", \"translated_text\": \"<english>\", \"category\": \"<category>\", \"explanation\": \"<1-2 sentences>\"}";

const POSITIVE_WORDS: &[&str] = &[
    "love",
    "great",
    "awesome",
    "excellent",
    "amazing",
    "best",
    "wonderful",
    "fantastic",
    "good",
    "nice",
    "perfect",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad",
    "terrible",
    "awful",
    "worst",
    "horrible",
    "poor",
    "disappointing",
    "useless",
    "waste",
];

const HATE_WORDS: &[&str] = &[
    "hate",
    "stupid",
    "idiot",
    "moron",
    "dumb",
    "ugly",
    "disgusting",
    "pathetic",
    "loser",
    "trash",
    "garbage",
    "kill",
    "die",
];

/// Nuanced intents, checked in order; the first matching cue wins.
const NUANCED_CUES: &[(NuancedLabel, &[&str])] = &[
    (NuancedLabel::Love, &["love", "❤", "😍"]),
    (NuancedLabel::Appreciation, &["thanks", "thank you", "appreciate"]),
    (NuancedLabel::BuyingDesire, &["buy", "purchase", "price", "how much", "order"]),
    (
        NuancedLabel::MoreLikeThisDesire,
        &["more like this", "more of this", "do more", "another one"],
    ),
    (NuancedLabel::Resist, &["won't", "will not", "never", "don't", "nope"]),
    (NuancedLabel::Complaint, &["wtf", "trash", "scam", "refund", "broken"]),
    (NuancedLabel::Question, &["?", "how", "what", "when", "where", "why"]),
];

/// Verdict for a single piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    /// -1.0 (hostile) to 1.0 (positive)
    pub score: f64,
    pub confidence: f64,
    pub nuanced_label: NuancedLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl SentimentResult {
    fn heuristic(label: SentimentLabel, score: f64, confidence: f64, nuanced_label: NuancedLabel) -> Self {
        Self {
            label,
            score,
            confidence,
            nuanced_label,
            language: None,
            translated_text: None,
            category: None,
            explanation: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LlmVerdict {
    language: String,
    translated_text: String,
    category: Option<String>,
    explanation: String,
}

#[derive(Clone)]
pub struct SentimentAnalyzer {
    client: Option<Arc<dyn ChatClient>>,
    model: String,
}

impl SentimentAnalyzer {
    pub fn new(client: Option<Arc<dyn ChatClient>>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Classify `text`. Never fails; see the module docs for the fallback policy.
    #[instrument(skip_all, fields(len = text.len()))]
    pub async fn analyze(&self, text: &str) -> SentimentResult {
        if let Some(client) = &self.client
            && !text.trim().is_empty()
        {
            match self.classify_with_llm(client.as_ref(), text).await {
                Ok(result) => return result,
                Err(e) => warn!("LLM sentiment classification failed, using rules: {e:#}"),
            }
        }
        classify_with_rules(text)
    }

    /// Sequential per-item [`analyze`](Self::analyze).
    pub async fn batch_analyze(&self, texts: &[String]) -> Vec<SentimentResult> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.analyze(text).await);
        }
        results
    }

    async fn classify_with_llm(&self, client: &dyn ChatClient, text: &str) -> anyhow::Result<SentimentResult> {
        let completion = client
            .complete(ChatRequest {
                model: self.model.clone(),
                messages: vec![ChatMessage::system(CLASSIFICATION_PROMPT), ChatMessage::user(text)],
                temperature: Some(0.0),
                max_tokens: None,
            })
            .await?;

        let verdict: LlmVerdict = serde_json::from_str(strip_code_fence(&completion.content))?;
        let category = verdict.category.unwrap_or_else(|| "Neutral".to_string()).trim().to_string();
        let (label, nuanced_label) = map_category(&category);
        debug!(%label, %nuanced_label, "LLM classified comment as {category}");

        Ok(SentimentResult {
            label,
            score: 0.0,
            confidence: 0.9,
            nuanced_label,
            language: Some(verdict.language.trim().to_string()),
            translated_text: Some(verdict.translated_text.trim().to_string()),
            category: Some(category),
            explanation: Some(verdict.explanation.trim().to_string()),
        })
    }
}

/// Models sometimes wrap JSON in a markdown fence despite instructions.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn map_category(category: &str) -> (SentimentLabel, NuancedLabel) {
    let category = category.to_lowercase();
    if category.contains("hate") || category.contains("offensive") {
        (SentimentLabel::Hate, NuancedLabel::None)
    } else if category.contains("positive") {
        (SentimentLabel::Positive, NuancedLabel::Appreciation)
    } else if category.contains("negative") {
        (SentimentLabel::Negative, NuancedLabel::Complaint)
    } else if category.contains("purchase") {
        (SentimentLabel::Neutral, NuancedLabel::BuyingDesire)
    } else if category.contains("question") {
        (SentimentLabel::Neutral, NuancedLabel::Question)
    } else {
        (SentimentLabel::Neutral, NuancedLabel::None)
    }
}

fn count_matches(text: &str, words: &[&str]) -> usize {
    words.iter().filter(|word| text.contains(*word)).count()
}

fn detect_nuance(text: &str) -> NuancedLabel {
    NUANCED_CUES
        .iter()
        .find(|(_, cues)| cues.iter().any(|cue| text.contains(cue)))
        .map(|(label, _)| *label)
        .unwrap_or_default()
}

/// Keyword heuristic over the lowercased text (substring matching).
pub fn classify_with_rules(text: &str) -> SentimentResult {
    let text = text.to_lowercase();

    if count_matches(&text, HATE_WORDS) > 0 {
        return SentimentResult::heuristic(SentimentLabel::Hate, -0.9, 0.95, NuancedLabel::None);
    }

    let positive = count_matches(&text, POSITIVE_WORDS);
    let negative = count_matches(&text, NEGATIVE_WORDS);
    let nuance = detect_nuance(&text);

    match positive.cmp(&negative) {
        std::cmp::Ordering::Greater => SentimentResult::heuristic(SentimentLabel::Positive, 0.7, 0.85, nuance),
        std::cmp::Ordering::Less => SentimentResult::heuristic(SentimentLabel::Negative, -0.7, 0.85, nuance),
        std::cmp::Ordering::Equal => SentimentResult::heuristic(SentimentLabel::Neutral, 0.0, 0.75, nuance),
    }
}
