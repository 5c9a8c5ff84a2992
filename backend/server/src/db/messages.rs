//! Notifications inbox and donor ↔ orphanage chat.

use sqlx::SqlitePool;

use super::{notify, now};
use crate::errors::{AppError, Result};
use crate::models::{MessageRecord, NewMessage, NotificationRecord};
use crate::notifications::{NewNotification, NotificationKind};

pub async fn notifications_for(pool: &SqlitePool, user_id: i64, unread_only: bool) -> Result<Vec<NotificationRecord>> {
    let rows = sqlx::query_as::<_, NotificationRecord>(
        r#"
        SELECT id, user_id, kind, subject_id, message, is_read, created_at
        FROM   notifications
        WHERE  user_id = ?1 AND (?2 = 0 OR is_read = 0)
        ORDER  BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn mark_read(pool: &SqlitePool, id: i64) -> Result<bool> {
    let affected = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

/// Store a chat message and notify its recipient.
pub async fn send_message(pool: &SqlitePool, msg: &NewMessage) -> Result<MessageRecord> {
    let body = msg.body.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("message body is empty".to_string()));
    }
    if msg.sender_id == msg.recipient_id {
        return Err(AppError::BadRequest("cannot message yourself".to_string()));
    }

    let mut tx = pool.begin().await?;
    let id = sqlx::query(
        "INSERT INTO messages (sender_id, recipient_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(msg.sender_id)
    .bind(msg.recipient_id)
    .bind(body)
    .bind(now())
    .execute(&mut *tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            AppError::NotFound("sender or recipient".to_string())
        }
        other => AppError::Database(other),
    })?
    .last_insert_rowid();

    notify(
        &mut tx,
        &NewNotification::new(
            msg.recipient_id,
            NotificationKind::MessageReceived,
            id,
            preview(body),
        ),
    )
    .await?;

    let record = sqlx::query_as::<_, MessageRecord>(
        "SELECT id, sender_id, recipient_id, body, created_at FROM messages WHERE id = ?1",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(record)
}

/// Both directions of a conversation, oldest first.
pub async fn conversation(pool: &SqlitePool, a: i64, b: i64) -> Result<Vec<MessageRecord>> {
    let rows = sqlx::query_as::<_, MessageRecord>(
        r#"
        SELECT id, sender_id, recipient_id, body, created_at
        FROM   messages
        WHERE  (sender_id = ?1 AND recipient_id = ?2)
           OR  (sender_id = ?2 AND recipient_id = ?1)
        ORDER  BY created_at ASC, id ASC
        "#,
    )
    .bind(a)
    .bind(b)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn preview(body: &str) -> String {
    const MAX: usize = 80;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_string(),
    }
}
