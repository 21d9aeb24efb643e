use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, DatabaseConnection, DbErr, Set};

use super::{Notification, NotificationSink};
use crate::{entity::notifications::ActiveModel as NotificationActive, state::AppState};

/// Writes notifications to the in-app inbox table.
pub struct DbNotificationSink {
    orm: DatabaseConnection,
}

impl DbNotificationSink {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl NotificationSink for DbNotificationSink {
    async fn notify(&self, notification: Notification) -> Result<(), DbErr> {
        NotificationActive {
            id: NotSet,
            recipient_id: Set(notification.recipient_id),
            title: Set(notification.title),
            content: Set(notification.content),
            source_order_id: Set(notification.source_order_id),
            is_read: Set(false),
            created_at: Set(Utc::now().into()),
        }
        .insert(&self.orm)
        .await?;
        Ok(())
    }
}

pub fn send_notification(state: &AppState, notification: Notification) {
    let sink = state.notifier.clone();
    tokio::spawn(async move {
        let recipient_id = notification.recipient_id;
        if let Err(err) = sink.notify(notification).await {
            tracing::warn!(error = %err, recipient_id, "notification delivery failed");
        }
    });
}
