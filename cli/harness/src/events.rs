//! Notification history as an [`EventSource`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pcc_client::models::Notification;
use pcc_client::PccClient;
use pcc_converge::{ConvergeError, EventSource, LogEvent};

pub struct NotificationFeed<'a> {
    client: &'a PccClient,
}

impl<'a> NotificationFeed<'a> {
    pub fn new(client: &'a PccClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventSource for NotificationFeed<'_> {
    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<LogEvent>, ConvergeError> {
        let notifications = self
            .client
            .notifications_since(since)
            .await
            .map_err(|e| ConvergeError::observation("notifications", e))?;

        Ok(notifications.into_iter().map(to_event).collect())
    }
}

fn to_event(notification: Notification) -> LogEvent {
    LogEvent {
        seq: notification.id.value(),
        timestamp: notification.created_at,
        message: notification.message,
    }
}
