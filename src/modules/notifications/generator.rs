//! Idempotent creation of reader notifications.
//!
//! A partial unique index on `(issue_id, kind)` backs every insert here, so
//! re-running a generator for the same issue is a no-op.

use chrono::{NaiveDate, Utc};
use libris_kernel::settings::LibrarySettings;
use sqlx::{SqliteConnection, SqlitePool};

use super::models::NotificationKind;
use crate::modules::catalog::models::Book;
use crate::modules::circulation::models::{Issue, IssueRequest};
use crate::utils::shift_days;

/// "Book Issued" notice. Returns whether a new row was written.
pub async fn notify_issued(
    conn: &mut SqliteConnection,
    issue: &Issue,
    book: &Book,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO notifications (reader_id, issue_id, kind, title, message, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT DO NOTHING",
    )
    .bind(issue.reader_id)
    .bind(issue.id)
    .bind(NotificationKind::Issued)
    .bind(format!("Book Issued: {}", book.name))
    .bind(format!(
        "You have been issued '{}' by {}. Due date: {}",
        book.name, book.author, issue.due_date
    ))
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Tell the reader their request was turned down.
pub async fn notify_request_rejected(
    conn: &mut SqliteConnection,
    request: &IssueRequest,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO notifications (reader_id, issue_id, kind, title, message, created_at)
         SELECT ?1, NULL, ?2,
                'Request Rejected: ' || b.name,
                'Your request to issue ''' || b.name || ''' was rejected by the library administrator.',
                ?3
         FROM books b
         WHERE b.id = ?4",
    )
    .bind(request.reader_id)
    .bind(NotificationKind::RequestRejected)
    .bind(Utc::now())
    .bind(request.book_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Remind readers whose open issues fall due exactly `due_soon_days` from today.
pub async fn sweep_due_soon(
    db: &SqlitePool,
    rules: &LibrarySettings,
    today: NaiveDate,
    reader_id: Option<i64>,
) -> Result<u64, sqlx::Error> {
    let Some(target) = shift_days(today, rules.due_soon_days) else {
        return Ok(0);
    };
    let result = sqlx::query(
        "INSERT INTO notifications (reader_id, issue_id, kind, title, message, created_at)
         SELECT i.reader_id, i.id, ?1,
                'Due Soon: ' || b.name,
                '''' || b.name || ''' is due on ' || i.due_date
                    || '. Please return it on time to avoid fines.',
                ?2
         FROM issues i
         JOIN books b ON b.id = i.book_id
         WHERE i.returned_date IS NULL
           AND i.due_date = ?3
           AND (?4 IS NULL OR i.reader_id = ?4)
         ON CONFLICT DO NOTHING",
    )
    .bind(NotificationKind::DueSoon)
    .bind(Utc::now())
    .bind(target)
    .bind(reader_id)
    .execute(db)
    .await?;

    let created = result.rows_affected();
    tracing::debug!(target: "libris.notifications", created, %target, "due-soon sweep");
    Ok(created)
}

/// Warn readers about open issues past their due date.
pub async fn sweep_overdue(
    db: &SqlitePool,
    today: NaiveDate,
    reader_id: Option<i64>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO notifications (reader_id, issue_id, kind, title, message, created_at)
         SELECT i.reader_id, i.id, ?1,
                'Overdue: ' || b.name,
                '''' || b.name || ''' is '
                    || CAST(julianday(?3) - julianday(i.due_date) AS INTEGER)
                    || ' day(s) overdue. Please return it immediately to avoid additional fines.',
                ?2
         FROM issues i
         JOIN books b ON b.id = i.book_id
         WHERE i.returned_date IS NULL
           AND i.due_date < ?3
           AND (?4 IS NULL OR i.reader_id = ?4)
         ON CONFLICT DO NOTHING",
    )
    .bind(NotificationKind::Overdue)
    .bind(Utc::now())
    .bind(today)
    .bind(reader_id)
    .execute(db)
    .await?;

    let created = result.rows_affected();
    tracing::debug!(target: "libris.notifications", created, %today, "overdue sweep");
    Ok(created)
}
