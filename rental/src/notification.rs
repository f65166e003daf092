//! User notifications produced from workflow events.

use crate::error::{RentalError, Result};
use rentflow_core::environment::Clock;
use rentflow_core::repository::NotificationRepository;
use rentflow_core::types::{
    NewNotification, Notification, NotificationId, NotificationStatus, UserId,
};
use std::sync::Arc;
use tracing::debug;

/// Stores and manages notifications.
pub struct NotificationService<R> {
    notifications: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: NotificationRepository> NotificationService<R> {
    /// Wire the service.
    #[must_use]
    pub fn new(notifications: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            notifications,
            clock,
        }
    }

    /// Store an UNREAD notification.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] on store failure.
    pub async fn create(
        &self,
        user_id: UserId,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Notification> {
        let notification = self
            .notifications
            .insert(NewNotification {
                user_id,
                kind: kind.into(),
                message: message.into(),
                created_at: self.clock.now(),
            })
            .await?;
        debug!(notification_id = %notification.id, user_id = %user_id, kind = %notification.kind, "Notification created");
        Ok(notification)
    }

    /// A user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] on store failure.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let mut notifications = self.notifications.find_by_user(user_id).await?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    /// Look up one notification.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] on store failure.
    pub async fn get(&self, notification_id: NotificationId) -> Result<Option<Notification>> {
        Ok(self.notifications.find_by_id(notification_id).await?)
    }

    /// Acknowledge a notification.
    ///
    /// # Errors
    ///
    /// - [`RentalError::NotFound`] if it does not exist
    /// - [`RentalError::Repository`] on store failure
    pub async fn mark_read(&self, notification_id: NotificationId) -> Result<Notification> {
        let mut notification = self
            .notifications
            .find_by_id(notification_id)
            .await?
            .ok_or(RentalError::NotFound {
                entity: "notification",
                id: notification_id.value(),
            })?;

        if notification.status != NotificationStatus::Read {
            notification.status = NotificationStatus::Read;
            self.notifications.update(&notification).await?;
        }
        Ok(notification)
    }

    /// Delete a notification. Deleting a missing one is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RentalError::Repository`] on store failure.
    pub async fn delete(&self, notification_id: NotificationId) -> Result<()> {
        Ok(self.notifications.delete_by_id(notification_id).await?)
    }
}
