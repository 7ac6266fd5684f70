//! Sentiment-driven comment moderation: classification, reply generation, the reply policy and
//! the pipeline that ties them to storage and the platforms.

pub mod policy;
pub mod responses;
pub mod sentiment;
pub mod service;
pub mod webhook;

pub use service::{IncomingComment, ModerationService, ProcessedComment, ReviewOutcome, SyncOutcome};
