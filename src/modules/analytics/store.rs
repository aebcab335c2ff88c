use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};

use super::models::{BookAnalytics, IssuanceRecord};
use crate::modules::catalog::models::Book;
use crate::utils::shift_days;

const POPULAR_RATING: f64 = 4.5;

/// Count one issuance of the book on the given day.
pub async fn record_issuance(
    conn: &mut SqliteConnection,
    book_id: i64,
    date: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO book_issuance_records (book_id, date, quantity_issued) VALUES (?, ?, 1)
         ON CONFLICT (book_id, date) DO UPDATE SET quantity_issued = quantity_issued + 1",
    )
    .bind(book_id)
    .bind(date)
    .execute(conn)
    .await?;
    Ok(())
}

/// Daily counts from `today - days` through `today`, both ends included.
pub async fn book_series(
    db: &SqlitePool,
    book_id: i64,
    today: NaiveDate,
    days: i64,
) -> Result<BookAnalytics, sqlx::Error> {
    let start = shift_days(today, -days).unwrap_or(NaiveDate::MIN);
    let records: Vec<IssuanceRecord> = sqlx::query_as(
        "SELECT date, quantity_issued FROM book_issuance_records
         WHERE book_id = ? AND date >= ? AND date <= ?
         ORDER BY date",
    )
    .bind(book_id)
    .bind(start)
    .bind(today)
    .fetch_all(db)
    .await?;
    Ok(BookAnalytics::from_records(book_id, days, records))
}

/// A random handful of highly rated books.
pub async fn popular_books(
    db: &SqlitePool,
    limit: i64,
    exclude: Option<i64>,
) -> Result<Vec<Book>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM books
         WHERE rating > ?1 AND (?2 IS NULL OR id <> ?2)
         ORDER BY RANDOM()
         LIMIT ?3",
    )
    .bind(POPULAR_RATING)
    .bind(exclude)
    .bind(limit)
    .fetch_all(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, day};

    #[tokio::test]
    async fn series_covers_the_trailing_window() {
        let db = testing::pool().await;
        let book = testing::book(&db, "Dune", "Frank Herbert", "100", 5).await;
        let mut conn = db.acquire().await.unwrap();
        for date in [day(2024, 1, 1), day(2024, 3, 1), day(2024, 3, 1), day(2024, 3, 31)] {
            record_issuance(&mut conn, book.id, date).await.unwrap();
        }
        drop(conn);

        let stats = book_series(&db, book.id, day(2024, 3, 31), 30).await.unwrap();
        assert_eq!(stats.dates, vec![day(2024, 3, 1), day(2024, 3, 31)]);
        assert_eq!(stats.quantities, vec![2, 1]);
        assert_eq!(stats.total_issued, 3);
        assert_eq!(stats.avg_per_day, 1.5);
    }

    #[tokio::test]
    async fn popular_books_are_highly_rated_and_exclusive() {
        let db = testing::pool().await;
        let plain = testing::book(&db, "Plain", "Anon", "1", 1).await;
        let mut stars = Vec::new();
        for n in 0..4 {
            let book = testing::book(&db, &format!("Star {n}"), "Anon", &format!("s{n}"), 1).await;
            sqlx::query("UPDATE books SET rating = 4.8 WHERE id = ?")
                .bind(book.id)
                .execute(&db)
                .await
                .unwrap();
            stars.push(book.id);
        }

        let picks = popular_books(&db, 3, Some(stars[0])).await.unwrap();
        assert_eq!(picks.len(), 3);
        assert!(picks.iter().all(|b| b.id != stars[0] && b.id != plain.id));
        assert!(picks.iter().all(|b| b.rating > 4.5));
    }
}
