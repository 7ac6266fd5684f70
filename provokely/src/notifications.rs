//! In-process notification fan-out.
//!
//! Each user with at least one open stream gets a broadcast channel. Publishing to a user with no
//! subscribers is a no-op, and the channel is dropped once its last receiver goes away. The hub is
//! process-local: a second replica will not see events published here.

use crate::types::{NotificationId, SentimentLabel, UserId, abbrev_uuid};
use dashmap::DashMap;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::debug;
use utoipa::ToSchema;

/// Events buffered per user before slow streams start lagging.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LatestNotification {
    #[schema(value_type = String, format = "uuid")]
    pub id: NotificationId,
    pub text: String,
    pub label: Option<SentimentLabel>,
    pub needs_approval: bool,
}

/// Payload pushed to a user's open streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationEvent {
    pub unread_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<LatestNotification>,
}

#[derive(Clone, Default)]
pub struct NotificationHub {
    channels: Arc<DashMap<UserId, broadcast::Sender<NotificationEvent>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, user_id: UserId) -> broadcast::Receiver<NotificationEvent> {
        self.channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// A stream of the user's events that frees the channel when it is dropped.
    pub fn stream(&self, user_id: UserId) -> Subscription {
        Subscription {
            events: Some(BroadcastStream::new(self.subscribe(user_id))),
            hub: self.clone(),
            user_id,
        }
    }

    /// Send to every open stream of the user. Returns how many received it.
    pub fn publish(&self, user_id: UserId, event: NotificationEvent) -> usize {
        let Some(sender) = self.channels.get(&user_id).map(|s| s.clone()) else {
            return 0;
        };

        match sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                // every receiver is gone
                self.release(user_id);
                0
            }
        }
    }

    /// Drop the user's channel once nothing listens on it.
    pub fn release(&self, user_id: UserId) {
        if self.channels.remove_if(&user_id, |_, s| s.receiver_count() == 0).is_some() {
            debug!(user_id = %abbrev_uuid(&user_id), "Dropped notification channel with no subscribers");
        }
    }

    pub fn subscriber_count(&self, user_id: UserId) -> usize {
        self.channels.get(&user_id).map(|s| s.receiver_count()).unwrap_or(0)
    }
}

/// One open stream of a user's events.
pub struct Subscription {
    events: Option<BroadcastStream<NotificationEvent>>,
    hub: NotificationHub,
    user_id: UserId,
}

impl Stream for Subscription {
    type Item = Result<NotificationEvent, BroadcastStreamRecvError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.events.as_mut() {
            Some(events) => Pin::new(events).poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // the receiver has to go before the channel can be released
        self.events.take();
        self.hub.release(self.user_id);
    }
}
