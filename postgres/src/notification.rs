use crate::{PostgresRentalStore, column, require_row, storage};
use rentflow_core::repository::{NotificationRepository, RepositoryError, Result};
use rentflow_core::types::{
    NewNotification, Notification, NotificationId, NotificationStatus, UserId,
};
use sqlx::postgres::PgRow;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, message, status, created_at";

fn notification_from_row(row: &PgRow) -> Result<Notification> {
    let status: String = column(row, "status")?;
    let status = NotificationStatus::parse(&status).ok_or_else(|| {
        RepositoryError::Corrupt(format!("unknown notification status {status}"))
    })?;

    Ok(Notification {
        id: NotificationId::new(column(row, "id")?),
        user_id: UserId::new(column(row, "user_id")?),
        kind: column(row, "kind")?,
        message: column(row, "message")?,
        status,
        created_at: column(row, "created_at")?,
    })
}

impl NotificationRepository for PostgresRentalStore {
    async fn find_by_id(&self, id: NotificationId) -> Result<Option<Notification>> {
        let row = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("get notification"))?;

        row.as_ref().map(notification_from_row).transpose()
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(storage("list notifications"))?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn insert(&self, notification: NewNotification) -> Result<Notification> {
        let (id,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO notifications (user_id, kind, message, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(notification.user_id.value())
        .bind(&notification.kind)
        .bind(&notification.message)
        .bind(NotificationStatus::Unread.as_str())
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(storage("insert notification"))?;

        Ok(notification.with_id(NotificationId::new(id)))
    }

    async fn update(&self, notification: &Notification) -> Result<()> {
        let result = sqlx::query(
            "UPDATE notifications SET kind = $2, message = $3, status = $4 WHERE id = $1",
        )
        .bind(notification.id.value())
        .bind(&notification.kind)
        .bind(&notification.message)
        .bind(notification.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(storage("update notification"))?;

        require_row(result.rows_affected(), "notification", notification.id.value())
    }

    async fn delete_by_id(&self, id: NotificationId) -> Result<()> {
        sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id.value())
            .execute(&self.pool)
            .await
            .map_err(storage("delete notification"))?;
        Ok(())
    }
}
