//! Notification history.

use chrono::{DateTime, Utc};

use crate::error::ApiError;
use crate::models::Notification;
use crate::PccClient;

impl PccClient {
    /// Notifications emitted at or after `since`.
    pub async fn notifications_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<Notification>, ApiError> {
        self.get_list(&format!(
            "pccserver/notifications/history?startTime={}",
            since.timestamp_millis()
        ))
        .await
    }
}
