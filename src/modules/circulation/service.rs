//! Issue, return and request workflows.
//!
//! Every mutation runs inside one transaction. The stock decrement is
//! conditional on a copy being left, so two concurrent issues of the last
//! copy cannot both succeed.

use chrono::NaiveDate;
use libris_kernel::settings::LibrarySettings;
use sqlx::{Acquire, SqliteConnection, SqlitePool};

use super::error::CirculationError;
use super::models::{
    Approval, BulkOutcome, Issue, IssueCommand, IssueRequest, IssueRow, IssueView,
    ReaderDashboard, RequestView,
};
use crate::modules::accounts::store as accounts;
use crate::modules::analytics::store as analytics;
use crate::modules::catalog::store as catalog;
use crate::modules::fines::engine as fines;
use crate::modules::notifications::{generator as notify, store as notifications};
use crate::utils::{is_unique_violation, shift_days, Page, PageParams};

const ISSUE_VIEW: &str = "
    SELECT i.*, b.name AS book_name, b.isbn AS book_isbn,
           r.reader_id AS reader_code, r.name AS reader_name
    FROM issues i
    JOIN books b ON b.id = i.book_id
    JOIN readers r ON r.id = i.reader_id";

const REQUEST_VIEW: &str = "
    SELECT q.*, b.name AS book_name, r.reader_id AS reader_code, r.name AS reader_name
    FROM issue_requests q
    JOIN books b ON b.id = q.book_id
    JOIN readers r ON r.id = q.reader_id";

/// Due date for a new issue: the explicit one when it is within the allowed
/// window, otherwise the reader's default loan period.
pub fn resolve_due_date(
    rules: &LibrarySettings,
    is_staff_member: bool,
    issued: NaiveDate,
    requested: Option<NaiveDate>,
) -> Result<NaiveDate, CirculationError> {
    let invalid = || CirculationError::InvalidDueDate {
        max_days: rules.max_custom_loan_days,
    };
    match requested {
        Some(due) => {
            let latest =
                shift_days(issued, rules.max_custom_loan_days).unwrap_or(NaiveDate::MAX);
            if due <= issued || due > latest {
                return Err(invalid());
            }
            Ok(due)
        }
        None if is_staff_member => shift_days(issued, rules.staff_loan_days).ok_or_else(invalid),
        None => shift_days(issued, rules.student_loan_days).ok_or_else(invalid),
    }
}

/// Open issues plus pending requests, optionally leaving one request out.
async fn holdings(
    conn: &mut SqliteConnection,
    reader_id: i64,
    excluding_request: Option<i64>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT
            (SELECT COUNT(*) FROM issues WHERE reader_id = ?1 AND returned_date IS NULL)
          + (SELECT COUNT(*) FROM issue_requests
             WHERE reader_id = ?1 AND approved = 0 AND rejected = 0
               AND (?2 IS NULL OR id <> ?2))",
    )
    .bind(reader_id)
    .bind(excluding_request)
    .fetch_one(conn)
    .await
}

async fn has_open_issue(
    conn: &mut SqliteConnection,
    reader_id: i64,
    book_id: i64,
) -> Result<bool, sqlx::Error> {
    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM issues
         WHERE reader_id = ? AND book_id = ? AND returned_date IS NULL",
    )
    .bind(reader_id)
    .bind(book_id)
    .fetch_one(conn)
    .await?;
    Ok(open > 0)
}

/// Validate and record an issue on an open connection or transaction.
///
/// `approving` names the request being converted so it does not count
/// against the reader's limit.
pub async fn issue_within(
    conn: &mut SqliteConnection,
    rules: &LibrarySettings,
    cmd: &IssueCommand,
    approving: Option<i64>,
    today: NaiveDate,
) -> Result<Issue, CirculationError> {
    let reader = accounts::find_reader(&mut *conn, cmd.reader_id)
        .await?
        .ok_or(CirculationError::ReaderNotFound(cmd.reader_id))?;
    let book = catalog::find_book(&mut *conn, cmd.book_id)
        .await?
        .ok_or(CirculationError::BookNotFound(cmd.book_id))?;

    if has_open_issue(conn, reader.id, book.id).await? {
        return Err(CirculationError::AlreadyIssued);
    }
    if book.number_in_stock <= 0 {
        return Err(CirculationError::OutOfStock);
    }
    let max = rules.max_issued_per_reader;
    if holdings(conn, reader.id, approving).await? >= max {
        return Err(CirculationError::LimitReached { max });
    }

    let issued_date = cmd.issued_date.unwrap_or(today);
    let due_date = resolve_due_date(rules, reader.is_staff_member, issued_date, cmd.due_date)?;

    let taken = sqlx::query(
        "UPDATE books SET number_in_stock = number_in_stock - 1
         WHERE id = ? AND number_in_stock > 0",
    )
    .bind(book.id)
    .execute(&mut *conn)
    .await?;
    if taken.rows_affected() == 0 {
        return Err(CirculationError::OutOfStock);
    }

    let issue: Issue = sqlx::query_as(
        "INSERT INTO issues (reader_id, book_id, issued_date, due_date)
         VALUES (?, ?, ?, ?)
         RETURNING *",
    )
    .bind(reader.id)
    .bind(book.id)
    .bind(issued_date)
    .bind(due_date)
    .fetch_one(&mut *conn)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            CirculationError::AlreadyIssued
        } else {
            CirculationError::Database(err)
        }
    })?;

    notify::notify_issued(&mut *conn, &issue, &book).await?;
    analytics::record_issuance(&mut *conn, book.id, issued_date).await?;
    Ok(issue)
}

/// Issue a book directly.
pub async fn issue_book(
    db: &SqlitePool,
    rules: &LibrarySettings,
    cmd: &IssueCommand,
    today: NaiveDate,
) -> Result<Issue, CirculationError> {
    let mut tx = db.begin().await?;
    let issue = issue_within(&mut tx, rules, cmd, None, today).await?;
    tx.commit().await?;

    tracing::info!(
        target: "libris.circulation",
        issue = issue.id,
        reader = issue.reader_id,
        book = issue.book_id,
        due = %issue.due_date,
        "book issued"
    );
    Ok(issue)
}

pub async fn find_issue(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Issue>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM issues WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
}

/// Close an issue and put the copy back on the shelf. Returning an already
/// returned issue changes nothing.
pub async fn return_book(
    db: &SqlitePool,
    issue_id: i64,
    today: NaiveDate,
) -> Result<Issue, CirculationError> {
    let mut tx = db.begin().await?;
    let issue = find_issue(&mut tx, issue_id)
        .await?
        .ok_or(CirculationError::IssueNotFound(issue_id))?;
    if !issue.is_open() {
        return Ok(issue);
    }

    let closed: Option<Issue> = sqlx::query_as(
        "UPDATE issues SET returned_date = ?
         WHERE id = ? AND returned_date IS NULL
         RETURNING *",
    )
    .bind(today)
    .bind(issue.id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(closed) = closed else {
        return Ok(issue);
    };

    sqlx::query("UPDATE books SET number_in_stock = number_in_stock + 1 WHERE id = ?")
        .bind(closed.book_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(target: "libris.circulation", issue = closed.id, book = closed.book_id, "book returned");
    Ok(closed)
}

/// A reader asks to borrow a book.
pub async fn request_book(
    db: &SqlitePool,
    rules: &LibrarySettings,
    reader_id: i64,
    book_id: i64,
) -> Result<IssueRequest, CirculationError> {
    let mut tx = db.begin().await?;
    catalog::find_book(&mut *tx, book_id)
        .await?
        .ok_or(CirculationError::BookNotFound(book_id))?;

    let max = rules.max_issued_per_reader;
    if holdings(&mut tx, reader_id, None).await? >= max {
        return Err(CirculationError::LimitReached { max });
    }
    if has_open_issue(&mut tx, reader_id, book_id).await? {
        return Err(CirculationError::AlreadyIssued);
    }

    let request: IssueRequest = sqlx::query_as(
        "INSERT INTO issue_requests (reader_id, book_id, request_date)
         VALUES (?, ?, ?)
         RETURNING *",
    )
    .bind(reader_id)
    .bind(book_id)
    .bind(chrono::Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            CirculationError::AlreadyRequested
        } else {
            CirculationError::Database(err)
        }
    })?;
    tx.commit().await?;

    tracing::info!(target: "libris.circulation", request = request.id, reader = reader_id, book = book_id, "issue requested");
    Ok(request)
}

async fn pending_request(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<IssueRequest, CirculationError> {
    let request: Option<IssueRequest> = sqlx::query_as(
        "SELECT * FROM issue_requests WHERE id = ? AND approved = 0 AND rejected = 0",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    request.ok_or(CirculationError::RequestNotFound(id))
}

async fn mark_rejected(
    conn: &mut SqliteConnection,
    request: &IssueRequest,
) -> Result<IssueRequest, CirculationError> {
    let rejected: IssueRequest =
        sqlx::query_as("UPDATE issue_requests SET rejected = 1 WHERE id = ? RETURNING *")
            .bind(request.id)
            .fetch_one(&mut *conn)
            .await?;
    notify::notify_request_rejected(&mut *conn, &rejected).await?;
    Ok(rejected)
}

/// Turn a pending request into an issue, re-checking every rule as of now.
/// A request that no longer passes is rejected and the reader told so.
pub async fn approve_request(
    db: &SqlitePool,
    rules: &LibrarySettings,
    request_id: i64,
    today: NaiveDate,
) -> Result<Approval, CirculationError> {
    let mut tx = db.begin().await?;
    let request = pending_request(&mut tx, request_id).await?;
    let cmd = IssueCommand::new(request.reader_id, request.book_id);

    let mut savepoint = tx.begin().await?;
    match issue_within(&mut savepoint, rules, &cmd, Some(request.id), today).await {
        Ok(issue) => {
            savepoint.commit().await?;
            sqlx::query("UPDATE issue_requests SET approved = 1 WHERE id = ?")
                .bind(request.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::info!(target: "libris.circulation", request = request.id, issue = issue.id, "request approved");
            Ok(Approval::Issued { issue })
        }
        Err(err) if err.is_rule_violation() => {
            savepoint.rollback().await?;
            let reason = err.to_string();
            let request = mark_rejected(&mut tx, &request).await?;
            tx.commit().await?;
            tracing::warn!(target: "libris.circulation", request = request.id, %reason, "stale request rejected on approval");
            Ok(Approval::Rejected { request, reason })
        }
        Err(err) => Err(err),
    }
}

pub async fn reject_request(
    db: &SqlitePool,
    request_id: i64,
) -> Result<IssueRequest, CirculationError> {
    let mut tx = db.begin().await?;
    let request = pending_request(&mut tx, request_id).await?;
    let request = mark_rejected(&mut tx, &request).await?;
    tx.commit().await?;

    tracing::info!(target: "libris.circulation", request = request.id, "request rejected");
    Ok(request)
}

fn outcome_of(request_id: i64, err: CirculationError) -> Result<BulkOutcome, CirculationError> {
    match err {
        CirculationError::Database(err) => Err(CirculationError::Database(err)),
        other => Ok(BulkOutcome {
            request_id,
            outcome: "not_processed",
            detail: Some(other.to_string()),
        }),
    }
}

/// Approve each request in turn; one request's failure does not stop the rest.
pub async fn bulk_approve(
    db: &SqlitePool,
    rules: &LibrarySettings,
    request_ids: &[i64],
    today: NaiveDate,
) -> Result<Vec<BulkOutcome>, CirculationError> {
    let mut outcomes = Vec::with_capacity(request_ids.len());
    for &request_id in request_ids {
        let outcome = match approve_request(db, rules, request_id, today).await {
            Ok(Approval::Issued { .. }) => BulkOutcome {
                request_id,
                outcome: "issued",
                detail: None,
            },
            Ok(Approval::Rejected { reason, .. }) => BulkOutcome {
                request_id,
                outcome: "rejected",
                detail: Some(reason),
            },
            Err(err) => outcome_of(request_id, err)?,
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

pub async fn bulk_reject(
    db: &SqlitePool,
    request_ids: &[i64],
) -> Result<Vec<BulkOutcome>, CirculationError> {
    let mut outcomes = Vec::with_capacity(request_ids.len());
    for &request_id in request_ids {
        let outcome = match reject_request(db, request_id).await {
            Ok(_) => BulkOutcome {
                request_id,
                outcome: "rejected",
                detail: None,
            },
            Err(err) => outcome_of(request_id, err)?,
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

/// All issues, newest first.
pub async fn list_issues(
    db: &SqlitePool,
    params: &PageParams,
    per_page: i64,
    today: NaiveDate,
) -> Result<Page<IssueView>, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issues")
        .fetch_one(db)
        .await?;
    let window = params.window(total, per_page);
    let rows: Vec<IssueRow> = sqlx::query_as(&format!(
        "{ISSUE_VIEW} ORDER BY i.issued_date DESC, i.id DESC LIMIT ? OFFSET ?"
    ))
    .bind(window.per_page)
    .bind(window.offset)
    .fetch_all(db)
    .await?;
    let items = rows.into_iter().map(|row| IssueView::new(row, today)).collect();
    Ok(Page::new(items, window, total))
}

/// Every issue, newest first, for export.
pub async fn all_issues(db: &SqlitePool, today: NaiveDate) -> Result<Vec<IssueView>, sqlx::Error> {
    let rows: Vec<IssueRow> = sqlx::query_as(&format!(
        "{ISSUE_VIEW} ORDER BY i.issued_date DESC, i.id DESC"
    ))
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|row| IssueView::new(row, today)).collect())
}

/// Open issues past their due date, most overdue first.
pub async fn overdue_issues(
    db: &SqlitePool,
    today: NaiveDate,
) -> Result<Vec<IssueView>, sqlx::Error> {
    let rows: Vec<IssueRow> = sqlx::query_as(&format!(
        "{ISSUE_VIEW} WHERE i.returned_date IS NULL AND i.due_date < ? ORDER BY i.due_date, i.id"
    ))
    .bind(today)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|row| IssueView::new(row, today)).collect())
}

/// One reader's issues, newest first.
pub async fn reader_issues(
    db: &SqlitePool,
    reader_id: i64,
    today: NaiveDate,
) -> Result<Vec<IssueView>, sqlx::Error> {
    let rows: Vec<IssueRow> = sqlx::query_as(&format!(
        "{ISSUE_VIEW} WHERE i.reader_id = ? ORDER BY i.issued_date DESC, i.id DESC"
    ))
    .bind(reader_id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|row| IssueView::new(row, today)).collect())
}

/// Requests awaiting a decision, oldest first.
pub async fn pending_requests(
    db: &SqlitePool,
    reader_id: Option<i64>,
) -> Result<Vec<RequestView>, sqlx::Error> {
    sqlx::query_as(&format!(
        "{REQUEST_VIEW}
         WHERE q.approved = 0 AND q.rejected = 0 AND (?1 IS NULL OR q.reader_id = ?1)
         ORDER BY q.request_date, q.id"
    ))
    .bind(reader_id)
    .fetch_all(db)
    .await
}

/// Bring the reader's fines and reminders up to date, then summarise their account.
pub async fn reader_dashboard(
    db: &SqlitePool,
    rules: &LibrarySettings,
    reader_id: i64,
    today: NaiveDate,
) -> Result<ReaderDashboard, sqlx::Error> {
    fines::assess_overdue(db, rules, today, Some(reader_id)).await?;
    notify::sweep_due_soon(db, rules, today, Some(reader_id)).await?;
    notify::sweep_overdue(db, today, Some(reader_id)).await?;

    Ok(ReaderDashboard {
        issues: reader_issues(db, reader_id, today).await?,
        pending_requests: pending_requests(db, Some(reader_id)).await?,
        unpaid_fines: fines::reader_unpaid(db, reader_id).await?,
        unread_notifications: notifications::unread_count(db, reader_id).await?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::modules::catalog::store::find_book;
    use crate::testing::{self, day};

    fn rules() -> LibrarySettings {
        LibrarySettings::default()
    }

    async fn stock(db: &SqlitePool, book_id: i64) -> i64 {
        find_book(db, book_id).await.unwrap().unwrap().number_in_stock
    }

    #[test]
    fn due_date_defaults_by_reader_kind() {
        let issued = day(2024, 1, 1);
        assert_eq!(
            resolve_due_date(&rules(), false, issued, None).unwrap(),
            day(2024, 1, 15)
        );
        assert_eq!(
            resolve_due_date(&rules(), true, issued, None).unwrap(),
            issued + Duration::days(182)
        );
    }

    #[test]
    fn default_due_date_past_the_calendar_is_invalid() {
        let last_week = NaiveDate::MAX - Duration::days(7);
        assert!(matches!(
            resolve_due_date(&rules(), false, last_week, None),
            Err(CirculationError::InvalidDueDate { .. })
        ));
        assert!(resolve_due_date(&rules(), true, last_week, None).is_err());
        assert_eq!(
            resolve_due_date(&rules(), false, last_week, Some(NaiveDate::MAX)).unwrap(),
            NaiveDate::MAX
        );
    }

    #[test]
    fn explicit_due_date_must_fall_in_window() {
        let issued = day(2024, 1, 1);
        assert!(resolve_due_date(&rules(), false, issued, Some(issued)).is_err());
        assert!(resolve_due_date(&rules(), false, issued, Some(day(2024, 2, 1))).is_err());
        assert_eq!(
            resolve_due_date(&rules(), false, issued, Some(day(2024, 1, 31))).unwrap(),
            day(2024, 1, 31)
        );
    }

    #[tokio::test]
    async fn issue_then_return_restores_stock() {
        let db = testing::pool().await;
        let reader = testing::reader(&db, "R1", false).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 2).await;
        let today = day(2024, 5, 1);

        let issue = issue_book(&db, &rules(), &IssueCommand::new(reader.id, book.id), today)
            .await
            .unwrap();
        assert_eq!(issue.due_date, day(2024, 5, 15));
        assert_eq!(stock(&db, book.id).await, 1);

        let returned = return_book(&db, issue.id, day(2024, 5, 3)).await.unwrap();
        assert_eq!(returned.returned_date, Some(day(2024, 5, 3)));
        assert_eq!(stock(&db, book.id).await, 2);

        // a second return is a no-op
        let again = return_book(&db, issue.id, day(2024, 5, 9)).await.unwrap();
        assert_eq!(again.returned_date, Some(day(2024, 5, 3)));
        assert_eq!(stock(&db, book.id).await, 2);
    }

    #[tokio::test]
    async fn issuance_notifies_and_counts() {
        let db = testing::pool().await;
        let reader = testing::reader(&db, "R1", false).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 2).await;
        let today = day(2024, 5, 1);
        issue_book(&db, &rules(), &IssueCommand::new(reader.id, book.id), today)
            .await
            .unwrap();

        let unread = notifications::unread_count(&db, reader.id).await.unwrap();
        assert_eq!(unread, 1);
        let series = analytics::book_series(&db, book.id, today, 90).await.unwrap();
        assert_eq!(series.total_issued, 1);
    }

    #[tokio::test]
    async fn never_two_open_issues_for_the_same_pair() {
        let db = testing::pool().await;
        let reader = testing::reader(&db, "R1", false).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 3).await;
        let cmd = IssueCommand::new(reader.id, book.id);
        let today = day(2024, 5, 1);

        issue_book(&db, &rules(), &cmd, today).await.unwrap();
        let err = issue_book(&db, &rules(), &cmd, today).await.unwrap_err();
        assert!(matches!(err, CirculationError::AlreadyIssued));
        assert_eq!(stock(&db, book.id).await, 2);

        let err = request_book(&db, &rules(), reader.id, book.id).await.unwrap_err();
        assert!(matches!(err, CirculationError::AlreadyIssued));
    }

    #[tokio::test]
    async fn out_of_stock_is_refused() {
        let db = testing::pool().await;
        let reader = testing::reader(&db, "R1", false).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 0).await;
        let err = issue_book(&db, &rules(), &IssueCommand::new(reader.id, book.id), day(2024, 5, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CirculationError::OutOfStock));
    }

    #[tokio::test]
    async fn limit_counts_issues_and_pending_requests() {
        let db = testing::pool().await;
        let reader = testing::reader(&db, "R1", false).await;
        let today = day(2024, 5, 1);
        let mut books = Vec::new();
        for n in 0..6 {
            books.push(testing::book(&db, &format!("Book {n}"), "Anon", &format!("{n}"), 1).await);
        }
        for book in &books[..3] {
            issue_book(&db, &rules(), &IssueCommand::new(reader.id, book.id), today)
                .await
                .unwrap();
        }
        for book in &books[3..5] {
            request_book(&db, &rules(), reader.id, book.id).await.unwrap();
        }

        let err = request_book(&db, &rules(), reader.id, books[5].id)
            .await
            .unwrap_err();
        assert!(matches!(err, CirculationError::LimitReached { max: 5 }));
        let err = issue_book(&db, &rules(), &IssueCommand::new(reader.id, books[5].id), today)
            .await
            .unwrap_err();
        assert!(matches!(err, CirculationError::LimitReached { .. }));
    }

    #[tokio::test]
    async fn duplicate_pending_request_is_refused() {
        let db = testing::pool().await;
        let reader = testing::reader(&db, "R1", false).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 1).await;
        request_book(&db, &rules(), reader.id, book.id).await.unwrap();
        let err = request_book(&db, &rules(), reader.id, book.id).await.unwrap_err();
        assert!(matches!(err, CirculationError::AlreadyRequested));
    }

    #[tokio::test]
    async fn approval_issues_the_book_and_excludes_itself_from_the_limit() {
        let db = testing::pool().await;
        let reader = testing::reader(&db, "R1", true).await;
        let today = day(2024, 5, 1);
        let mut requests = Vec::new();
        for n in 0..5 {
            let book = testing::book(&db, &format!("Book {n}"), "Anon", &format!("{n}"), 1).await;
            requests.push(request_book(&db, &rules(), reader.id, book.id).await.unwrap());
        }

        let approval = approve_request(&db, &rules(), requests[0].id, today)
            .await
            .unwrap();
        let Approval::Issued { issue } = approval else {
            panic!("expected the request to be issued");
        };
        assert_eq!(issue.due_date, today + Duration::days(182));

        // terminal now
        let err = approve_request(&db, &rules(), requests[0].id, today)
            .await
            .unwrap_err();
        assert!(matches!(err, CirculationError::RequestNotFound(_)));
        let err = reject_request(&db, requests[0].id).await.unwrap_err();
        assert!(matches!(err, CirculationError::RequestNotFound(_)));
    }

    #[tokio::test]
    async fn stale_request_is_rejected_at_approval() {
        let db = testing::pool().await;
        let ann = testing::reader(&db, "R1", false).await;
        let bob = testing::reader(&db, "R2", false).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 1).await;
        let today = day(2024, 5, 1);

        let request = request_book(&db, &rules(), ann.id, book.id).await.unwrap();
        issue_book(&db, &rules(), &IssueCommand::new(bob.id, book.id), today)
            .await
            .unwrap();

        let approval = approve_request(&db, &rules(), request.id, today).await.unwrap();
        let Approval::Rejected { request, reason } = approval else {
            panic!("expected a rejection");
        };
        assert!(request.rejected);
        assert_eq!(reason, CirculationError::OutOfStock.to_string());
        assert_eq!(stock(&db, book.id).await, 0);

        let titles: Vec<String> = sqlx::query_scalar(
            "SELECT title FROM notifications WHERE reader_id = ? AND kind = 'request_rejected'",
        )
        .bind(ann.id)
        .fetch_all(&db)
        .await
        .unwrap();
        assert_eq!(titles, vec!["Request Rejected: Dune".to_string()]);
    }

    #[tokio::test]
    async fn approval_never_exceeds_limit() {
        let db = testing::pool().await;
        let reader = testing::reader(&db, "R1", false).await;
        let today = day(2024, 5, 1);
        let wanted = testing::book(&db, "Wanted", "Anon", "w", 1).await;
        let request = request_book(&db, &rules(), reader.id, wanted.id).await.unwrap();

        // the limit fills up with direct issues after the request was made
        for n in 0..4 {
            let book = testing::book(&db, &format!("Book {n}"), "Anon", &format!("{n}"), 1).await;
            issue_book(&db, &rules(), &IssueCommand::new(reader.id, book.id), today)
                .await
                .unwrap();
        }
        let mut tight = rules();
        tight.max_issued_per_reader = 4;

        let approval = approve_request(&db, &tight, request.id, today).await.unwrap();
        assert!(matches!(approval, Approval::Rejected { .. }));
        assert_eq!(stock(&db, wanted.id).await, 1);
    }

    #[tokio::test]
    async fn bulk_outcomes_cover_each_id() {
        let db = testing::pool().await;
        let reader = testing::reader(&db, "R1", false).await;
        let a = testing::book(&db, "A", "Anon", "a", 1).await;
        let b = testing::book(&db, "B", "Anon", "b", 1).await;
        let ra = request_book(&db, &rules(), reader.id, a.id).await.unwrap();
        let rb = request_book(&db, &rules(), reader.id, b.id).await.unwrap();

        let outcomes = bulk_approve(&db, &rules(), &[ra.id, 999], day(2024, 5, 1))
            .await
            .unwrap();
        assert_eq!(outcomes[0].outcome, "issued");
        assert_eq!(outcomes[1].outcome, "not_processed");

        let outcomes = bulk_reject(&db, &[rb.id, ra.id]).await.unwrap();
        assert_eq!(outcomes[0].outcome, "rejected");
        assert_eq!(outcomes[1].outcome, "not_processed");
    }

    #[tokio::test]
    async fn listings_order_and_flag_overdue() {
        let db = testing::pool().await;
        let reader = testing::reader(&db, "R1", false).await;
        let a = testing::book(&db, "A", "Anon", "a", 1).await;
        let b = testing::book(&db, "B", "Anon", "b", 1).await;
        issue_book(&db, &rules(), &IssueCommand::new(reader.id, a.id), day(2024, 1, 1))
            .await
            .unwrap();
        issue_book(&db, &rules(), &IssueCommand::new(reader.id, b.id), day(2024, 1, 20))
            .await
            .unwrap();
        let today = day(2024, 1, 25);

        let page = list_issues(&db, &PageParams::default(), 20, today).await.unwrap();
        let names: Vec<&str> = page.items.iter().map(|v| v.book_name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert!(page.items[1].is_overdue);
        assert!(!page.items[0].is_overdue);

        let overdue = overdue_issues(&db, today).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].days_overdue, 10);
    }

    #[tokio::test]
    async fn dashboard_assesses_fines_and_reminders() {
        let db = testing::pool().await;
        let reader = testing::reader(&db, "R1", false).await;
        let late = testing::book(&db, "Late", "Anon", "l", 1).await;
        let soon = testing::book(&db, "Soon", "Anon", "s", 1).await;
        issue_book(&db, &rules(), &IssueCommand::new(reader.id, late.id), day(2024, 1, 1))
            .await
            .unwrap();
        issue_book(&db, &rules(), &IssueCommand::new(reader.id, soon.id), day(2024, 1, 4))
            .await
            .unwrap();

        // Late was due 01-15, Soon is due 01-18
        let dashboard = reader_dashboard(&db, &rules(), reader.id, day(2024, 1, 16))
            .await
            .unwrap();
        assert_eq!(dashboard.unpaid_fines.len(), 1);
        assert_eq!(dashboard.unpaid_fines[0].fine.amount, 2);
        // two "issued", one due-soon, one overdue
        assert_eq!(dashboard.unread_notifications, 4);

        let again = reader_dashboard(&db, &rules(), reader.id, day(2024, 1, 16))
            .await
            .unwrap();
        assert_eq!(again.unread_notifications, 4);
    }
}
