//! Overdue fine assessment.

use chrono::NaiveDate;
use libris_kernel::settings::LibrarySettings;
use sqlx::SqlitePool;

use super::models::{Fine, FineView, SweepReport};
use crate::modules::notifications::generator as notify;
use crate::utils::{Page, PageParams};

const FINE_VIEW: &str = "
    SELECT f.*, r.id AS reader_id, r.reader_id AS reader_code, r.name AS reader_name,
           b.name AS book_name, i.due_date AS due_date
    FROM fines f
    JOIN issues i ON i.id = f.issue_id
    JOIN readers r ON r.id = i.reader_id
    JOIN books b ON b.id = i.book_id";

pub fn days_overdue(due_date: NaiveDate, today: NaiveDate) -> i64 {
    (today - due_date).num_days().max(0)
}

pub fn fine_amount(rules: &LibrarySettings, due_date: NaiveDate, today: NaiveDate) -> i64 {
    rules.fine_per_day * days_overdue(due_date, today)
}

/// Create the missing fine for every open, overdue issue (optionally one
/// reader's). Existing fines are left untouched.
pub async fn assess_overdue(
    db: &SqlitePool,
    rules: &LibrarySettings,
    today: NaiveDate,
    reader_id: Option<i64>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO fines (issue_id, amount, paid, calculated_date)
         SELECT i.id,
                ?1 * CAST(julianday(?2) - julianday(i.due_date) AS INTEGER),
                0,
                ?2
         FROM issues i
         WHERE i.returned_date IS NULL
           AND i.due_date < ?2
           AND (?3 IS NULL OR i.reader_id = ?3)
         ON CONFLICT (issue_id) DO NOTHING",
    )
    .bind(rules.fine_per_day)
    .bind(today)
    .bind(reader_id)
    .execute(db)
    .await?;

    let created = result.rows_affected();
    if created > 0 {
        tracing::info!(target: "libris.fines", created, reader = ?reader_id, "fines assessed");
    }
    Ok(created)
}

/// Periodic pass over every reader: fines first, then reminders.
pub async fn run_sweep(
    db: &SqlitePool,
    rules: &LibrarySettings,
    today: NaiveDate,
) -> Result<SweepReport, sqlx::Error> {
    let report = SweepReport {
        fines_created: assess_overdue(db, rules, today, None).await?,
        due_soon_notices: notify::sweep_due_soon(db, rules, today, None).await?,
        overdue_notices: notify::sweep_overdue(db, today, None).await?,
    };
    tracing::info!(
        target: "libris.fines",
        %today,
        fines = report.fines_created,
        due_soon = report.due_soon_notices,
        overdue = report.overdue_notices,
        "sweep finished"
    );
    Ok(report)
}

/// All fines, most recently assessed first.
pub async fn list_fines(
    db: &SqlitePool,
    params: &PageParams,
    per_page: i64,
) -> Result<Page<FineView>, sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fines")
        .fetch_one(db)
        .await?;
    let window = params.window(total, per_page);
    let items = sqlx::query_as(&format!(
        "{FINE_VIEW} ORDER BY f.calculated_date DESC, f.id DESC LIMIT ? OFFSET ?"
    ))
    .bind(window.per_page)
    .bind(window.offset)
    .fetch_all(db)
    .await?;
    Ok(Page::new(items, window, total))
}

pub async fn all_fines(db: &SqlitePool) -> Result<Vec<FineView>, sqlx::Error> {
    sqlx::query_as(&format!("{FINE_VIEW} ORDER BY f.calculated_date DESC, f.id DESC"))
        .fetch_all(db)
        .await
}

pub async fn reader_unpaid(db: &SqlitePool, reader_id: i64) -> Result<Vec<FineView>, sqlx::Error> {
    sqlx::query_as(&format!(
        "{FINE_VIEW} WHERE r.id = ? AND f.paid = 0 ORDER BY f.calculated_date DESC, f.id DESC"
    ))
    .bind(reader_id)
    .fetch_all(db)
    .await
}

pub async fn pay_fine(db: &SqlitePool, id: i64) -> Result<Option<Fine>, sqlx::Error> {
    sqlx::query_as("UPDATE fines SET paid = 1 WHERE id = ? RETURNING *")
        .bind(id)
        .fetch_optional(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, day};

    #[test]
    fn amount_scales_with_days_overdue() {
        let rules = LibrarySettings::default();
        let due = day(2024, 2, 1);
        assert_eq!(fine_amount(&rules, due, day(2024, 2, 1)), 0);
        assert_eq!(fine_amount(&rules, due, day(2024, 2, 6)), 10);
        assert_eq!(fine_amount(&rules, due, day(2024, 1, 20)), 0);
    }

    #[tokio::test]
    async fn fine_is_created_once_and_frozen() {
        let db = testing::pool().await;
        let rules = LibrarySettings::default();
        let reader = testing::reader(&db, "R1", false).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 1).await;
        // due 2024-01-15
        testing::open_issue(&db, reader.id, book.id, day(2024, 1, 1)).await;

        assert_eq!(assess_overdue(&db, &rules, day(2024, 1, 15), None).await.unwrap(), 0);
        assert_eq!(assess_overdue(&db, &rules, day(2024, 1, 18), None).await.unwrap(), 1);
        assert_eq!(assess_overdue(&db, &rules, day(2024, 2, 18), None).await.unwrap(), 0);

        let unpaid = reader_unpaid(&db, reader.id).await.unwrap();
        assert_eq!(unpaid.len(), 1);
        assert_eq!(unpaid[0].fine.amount, 6);
        assert_eq!(unpaid[0].fine.calculated_date, day(2024, 1, 18));
        assert_eq!(unpaid[0].book_name, "Dune");
    }

    #[tokio::test]
    async fn returned_issues_are_not_fined() {
        let db = testing::pool().await;
        let rules = LibrarySettings::default();
        let reader = testing::reader(&db, "R1", false).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 1).await;
        let issue = testing::open_issue(&db, reader.id, book.id, day(2024, 1, 1)).await;
        sqlx::query("UPDATE issues SET returned_date = '2024-01-20' WHERE id = ?")
            .bind(issue.id)
            .execute(&db)
            .await
            .unwrap();

        assert_eq!(assess_overdue(&db, &rules, day(2024, 2, 1), None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn assessment_can_be_scoped_to_a_reader() {
        let db = testing::pool().await;
        let rules = LibrarySettings::default();
        let ann = testing::reader(&db, "R1", false).await;
        let bob = testing::reader(&db, "R2", false).await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 2).await;
        testing::open_issue(&db, ann.id, book.id, day(2024, 1, 1)).await;
        testing::open_issue(&db, bob.id, book.id, day(2024, 1, 1)).await;

        let created = assess_overdue(&db, &rules, day(2024, 2, 1), Some(ann.id))
            .await
            .unwrap();
        assert_eq!(created, 1);
        assert!(reader_unpaid(&db, bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn paying_and_listing() {
        let db = testing::pool().await;
        let rules = LibrarySettings::default();
        let reader = testing::reader(&db, "R1", false).await;
        let a = testing::book(&db, "A", "Anon", "a", 1).await;
        let b = testing::book(&db, "B", "Anon", "b", 1).await;
        testing::open_issue(&db, reader.id, a.id, day(2024, 1, 1)).await;
        testing::open_issue(&db, reader.id, b.id, day(2024, 1, 10)).await;

        assess_overdue(&db, &rules, day(2024, 1, 20), None).await.unwrap();
        assess_overdue(&db, &rules, day(2024, 1, 30), None).await.unwrap();

        let page = list_fines(&db, &PageParams::default(), 20).await.unwrap();
        let names: Vec<&str> = page.items.iter().map(|f| f.book_name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);

        let paid = pay_fine(&db, page.items[0].fine.id).await.unwrap().unwrap();
        assert!(paid.paid);
        assert_eq!(reader_unpaid(&db, reader.id).await.unwrap().len(), 1);
        assert!(pay_fine(&db, 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_reports_what_it_created() {
        let db = testing::pool().await;
        let rules = LibrarySettings::default();
        let reader = testing::reader(&db, "R1", false).await;
        let a = testing::book(&db, "A", "Anon", "a", 1).await;
        let b = testing::book(&db, "B", "Anon", "b", 1).await;
        testing::open_issue(&db, reader.id, a.id, day(2024, 1, 1)).await;
        testing::open_issue(&db, reader.id, b.id, day(2024, 1, 3)).await;

        // A is due 01-15, B is due 01-17
        let report = run_sweep(&db, &rules, day(2024, 1, 15)).await.unwrap();
        assert_eq!(report.fines_created, 0);
        assert_eq!(report.due_soon_notices, 1);
        assert_eq!(report.overdue_notices, 0);

        let report = run_sweep(&db, &rules, day(2024, 1, 16)).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                fines_created: 1,
                due_soon_notices: 0,
                overdue_notices: 1,
            }
        );
    }
}
