use sqlx::SqlitePool;

use super::models::Notification;

/// A reader's notifications, newest first.
pub async fn list_for_reader(
    db: &SqlitePool,
    reader_id: i64,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM notifications WHERE reader_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(reader_id)
    .fetch_all(db)
    .await
}

pub async fn unread_count(db: &SqlitePool, reader_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE reader_id = ? AND is_read = 0")
        .bind(reader_id)
        .fetch_one(db)
        .await
}

/// Mark one of the reader's notifications read. `None` when it is not theirs.
pub async fn mark_read(
    db: &SqlitePool,
    reader_id: i64,
    id: i64,
) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE notifications SET is_read = 1 WHERE id = ? AND reader_id = ? RETURNING *",
    )
    .bind(id)
    .bind(reader_id)
    .fetch_optional(db)
    .await
}

pub async fn mark_all_read(db: &SqlitePool, reader_id: i64) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE reader_id = ? AND is_read = 0")
            .bind(reader_id)
            .execute(db)
            .await?;
    Ok(result.rows_affected())
}
