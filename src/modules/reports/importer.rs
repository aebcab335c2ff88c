//! CSV bulk import of issues and books.

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use libris_kernel::settings::LibrarySettings;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use super::error::ReportError;
use crate::modules::accounts::store as accounts;
use crate::modules::catalog::models::{BookInput, BookStatus, DEFAULT_RATING};
use crate::modules::catalog::store as catalog;
use crate::modules::circulation::service::resolve_due_date;

const BOOK_COLUMNS: [&str; 8] = [
    "name",
    "isbn",
    "author",
    "category",
    "number_in_stock",
    "description",
    "rating",
    "status",
];
const NO_DESCRIPTION: &str = "No description available";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueImport {
    pub created: u64,
    pub skipped: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BookImport {
    pub created: u64,
    pub updated: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IssueCsvRow {
    reader_id: String,
    isbn: String,
    issued_date: String,
    due_date: String,
}

#[derive(Debug, Deserialize)]
struct BookCsvRow {
    name: String,
    isbn: String,
    author: String,
    category: String,
    number_in_stock: String,
    description: String,
    rating: String,
    status: String,
}

enum RowOutcome {
    Created,
    Skipped,
    Failed(&'static str),
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes())
}

fn parse_date(raw: &str) -> Result<Option<NaiveDate>, chrono::ParseError> {
    if raw.is_empty() {
        Ok(None)
    } else {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(Some)
    }
}

/// Create issues from `reader_id,isbn,issued_date,due_date` rows.
///
/// Each row commits on its own. Rows without a reader or ISBN, or that would
/// duplicate an open issue, are skipped; unknown references, empty stock and
/// bad dates count as errors. Imported issues send no notifications.
pub async fn import_issues(
    db: &SqlitePool,
    rules: &LibrarySettings,
    text: &str,
    today: NaiveDate,
) -> Result<IssueImport, ReportError> {
    let mut summary = IssueImport::default();
    let mut csv = reader(text);
    csv.headers()?;

    for (index, record) in csv.deserialize::<IssueCsvRow>().enumerate() {
        let row = match record {
            Ok(row) => row,
            Err(err) => {
                tracing::debug!(target: "libris.reports", row = index + 1, error = %err, "unreadable issue row");
                summary.errors += 1;
                continue;
            }
        };

        let mut tx = db.begin().await?;
        match import_issue_row(&mut tx, rules, &row, today).await {
            Ok(RowOutcome::Created) => {
                tx.commit().await?;
                summary.created += 1;
            }
            Ok(RowOutcome::Skipped) => summary.skipped += 1,
            Ok(RowOutcome::Failed(reason)) => {
                tracing::debug!(target: "libris.reports", row = index + 1, reason, "issue row rejected");
                summary.errors += 1;
            }
            Err(err) => {
                tracing::warn!(target: "libris.reports", row = index + 1, error = %err, "issue row failed");
                summary.errors += 1;
            }
        }
    }

    tracing::info!(
        target: "libris.reports",
        created = summary.created,
        skipped = summary.skipped,
        errors = summary.errors,
        "issues imported"
    );
    Ok(summary)
}

async fn import_issue_row(
    conn: &mut SqliteConnection,
    rules: &LibrarySettings,
    row: &IssueCsvRow,
    today: NaiveDate,
) -> Result<RowOutcome, sqlx::Error> {
    if row.reader_id.is_empty() || row.isbn.is_empty() {
        return Ok(RowOutcome::Skipped);
    }
    let Some(reader) = accounts::find_reader_by_code(&mut *conn, &row.reader_id).await? else {
        return Ok(RowOutcome::Failed("unknown reader"));
    };
    let Some(book) = catalog::find_book_by_isbn(&mut *conn, &row.isbn).await? else {
        return Ok(RowOutcome::Failed("unknown book"));
    };

    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM issues
         WHERE reader_id = ? AND book_id = ? AND returned_date IS NULL",
    )
    .bind(reader.id)
    .bind(book.id)
    .fetch_one(&mut *conn)
    .await?;
    if open > 0 {
        return Ok(RowOutcome::Skipped);
    }
    if book.number_in_stock <= 0 {
        return Ok(RowOutcome::Failed("out of stock"));
    }

    let Ok(issued) = parse_date(&row.issued_date) else {
        return Ok(RowOutcome::Failed("bad issued_date"));
    };
    let Ok(due) = parse_date(&row.due_date) else {
        return Ok(RowOutcome::Failed("bad due_date"));
    };
    let issued = issued.unwrap_or(today);
    let due = match due {
        Some(due) if due > issued => due,
        Some(_) => return Ok(RowOutcome::Failed("due_date not after issued_date")),
        None => match resolve_due_date(rules, reader.is_staff_member, issued, None) {
            Ok(due) => due,
            Err(_) => return Ok(RowOutcome::Failed("bad due_date")),
        },
    };

    let taken = sqlx::query(
        "UPDATE books SET number_in_stock = number_in_stock - 1
         WHERE id = ? AND number_in_stock > 0",
    )
    .bind(book.id)
    .execute(&mut *conn)
    .await?;
    if taken.rows_affected() == 0 {
        return Ok(RowOutcome::Failed("out of stock"));
    }

    sqlx::query("INSERT INTO issues (reader_id, book_id, issued_date, due_date) VALUES (?, ?, ?, ?)")
        .bind(reader.id)
        .bind(book.id)
        .bind(issued)
        .bind(due)
        .execute(&mut *conn)
        .await?;
    Ok(RowOutcome::Created)
}

fn missing_columns(headers: &StringRecord) -> Vec<String> {
    BOOK_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|h| h == **column))
        .map(|column| column.to_string())
        .collect()
}

fn book_input(
    row: BookCsvRow,
    category_id: Option<i64>,
    line: u64,
) -> Result<BookInput, ReportError> {
    let invalid = |message: String| ReportError::InvalidRow { line, message };

    let number_in_stock = if row.number_in_stock.is_empty() {
        0
    } else {
        row.number_in_stock.parse::<i64>().map_err(|_| {
            invalid(format!(
                "number_in_stock '{}' is not a whole number",
                row.number_in_stock
            ))
        })?
    };
    let rating = if row.rating.is_empty() {
        DEFAULT_RATING
    } else {
        row.rating
            .parse::<f64>()
            .map_err(|_| invalid(format!("rating '{}' is not a number", row.rating)))?
    };
    let status = match row.status.to_lowercase().as_str() {
        "" | "available" => BookStatus::Available,
        "issued" => BookStatus::Issued,
        "lost" => BookStatus::Lost,
        other => return Err(invalid(format!("unknown status '{other}'"))),
    };
    let description = if row.description.is_empty() {
        NO_DESCRIPTION.to_string()
    } else {
        row.description
    };

    let input = BookInput {
        name: row.name,
        isbn: row.isbn,
        author: row.author,
        category_id,
        number_in_stock,
        description: Some(description),
        rating: Some(rating),
        status: Some(status),
    };
    input
        .validate()
        .map_err(|err| invalid(err.to_string()))?;
    Ok(input)
}

/// Upsert books by ISBN, creating categories by name. All rows land or none do.
pub async fn import_books(db: &SqlitePool, text: &str) -> Result<BookImport, ReportError> {
    let mut csv = reader(text);
    let headers = csv.headers()?.clone();
    let missing = missing_columns(&headers);
    if !missing.is_empty() {
        return Err(ReportError::MissingColumns(missing));
    }

    let mut summary = BookImport::default();
    let mut tx = db.begin().await?;
    for record in csv.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row: BookCsvRow =
            record
                .deserialize(Some(&headers))
                .map_err(|err| ReportError::InvalidRow {
                    line,
                    message: err.to_string(),
                })?;

        let category_id = if row.category.is_empty() {
            None
        } else {
            Some(catalog::category_id_for_name(&mut tx, &row.category).await?)
        };
        let input = book_input(row, category_id, line)?;

        match catalog::find_book_by_isbn(&mut *tx, input.isbn.trim()).await? {
            Some(existing) => {
                catalog::update_book(&mut *tx, existing.id, &input).await?;
                summary.updated += 1;
            }
            None => {
                catalog::create_book(&mut *tx, &input).await?;
                summary.created += 1;
            }
        }
    }
    tx.commit().await?;

    tracing::info!(target: "libris.reports", created = summary.created, updated = summary.updated, "books imported");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::catalog::store::{find_book, find_book_by_isbn, list_categories};
    use crate::testing::{self, day};

    #[tokio::test]
    async fn issue_import_counts_each_outcome() {
        let db = testing::pool().await;
        let rules = LibrarySettings::default();
        let ann = testing::reader(&db, "R1", false).await;
        let staff = testing::reader(&db, "S1", true).await;
        let dune = testing::book(&db, "Dune", "Frank Herbert", "100", 2).await;
        let empty = testing::book(&db, "Empty", "Anon", "200", 0).await;

        let text = "\u{feff}reader_id,isbn,issued_date,due_date
R1,100,2024-01-01,
R1,100,,
,100,,
R9,100,,
S1,200,,
S1,100,01/02/2024,
S1,100,2024-01-05,2024-01-09
";
        let summary = import_issues(&db, &rules, text, day(2024, 1, 10)).await.unwrap();
        assert_eq!(
            summary,
            IssueImport {
                created: 2,
                skipped: 2,
                errors: 3,
            }
        );

        assert_eq!(find_book(&db, dune.id).await.unwrap().unwrap().number_in_stock, 0);
        assert_eq!(find_book(&db, empty.id).await.unwrap().unwrap().number_in_stock, 0);

        let dues: Vec<(i64, NaiveDate)> =
            sqlx::query_as("SELECT reader_id, due_date FROM issues ORDER BY id")
                .fetch_all(&db)
                .await
                .unwrap();
        assert_eq!(dues, vec![(ann.id, day(2024, 1, 15)), (staff.id, day(2024, 1, 9))]);

        let notices: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(notices, 0);
    }

    #[tokio::test]
    async fn unusable_dates_count_as_row_errors() {
        let db = testing::pool().await;
        let rules = LibrarySettings::default();
        testing::reader(&db, "R1", false).await;
        testing::book(&db, "Dune", "Frank Herbert", "100", 3).await;
        testing::book(&db, "Emma", "Jane Austen", "200", 3).await;
        testing::book(&db, "Ulysses", "James Joyce", "300", 3).await;
        let last_week = NaiveDate::MAX - chrono::Duration::days(6);

        let text = format!(
            "reader_id,isbn,issued_date,due_date
R1,100,{last_week},
R1,200,2024-01-10,2024-01-05
R1,300,,
"
        );
        let summary = import_issues(&db, &rules, &text, day(2024, 1, 10)).await.unwrap();
        assert_eq!(
            summary,
            IssueImport {
                created: 1,
                skipped: 0,
                errors: 2,
            }
        );
    }

    #[tokio::test]
    async fn book_import_upserts_by_isbn() {
        let db = testing::pool().await;
        testing::book(&db, "Old Name", "Anon", "100", 1).await;

        let text = "name,isbn,author,category,number_in_stock,description,rating,status
Dune,100,Frank Herbert,Sci-Fi,4,,4.8,Available
Emma,200,Jane Austen,Classics,2,A novel,,
Foundation,300,Isaac Asimov,Sci-Fi,1,,,lost
";
        let summary = import_books(&db, text).await.unwrap();
        assert_eq!(summary, BookImport { created: 2, updated: 1 });

        let dune = find_book_by_isbn(&db, "100").await.unwrap().unwrap();
        assert_eq!(dune.name, "Dune");
        assert_eq!(dune.number_in_stock, 4);
        assert_eq!(dune.description, NO_DESCRIPTION);

        let emma = find_book_by_isbn(&db, "200").await.unwrap().unwrap();
        assert_eq!(emma.rating, DEFAULT_RATING);

        let foundation = find_book_by_isbn(&db, "300").await.unwrap().unwrap();
        assert_eq!(foundation.status, BookStatus::Lost);
        assert_eq!(foundation.category_id, dune.category_id);

        let names: Vec<String> = list_categories(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Classics", "Sci-Fi"]);
    }

    #[tokio::test]
    async fn book_import_rejects_missing_columns() {
        let db = testing::pool().await;
        let err = import_books(&db, "name,isbn,author\nDune,100,Frank Herbert\n")
            .await
            .unwrap_err();
        match err {
            ReportError::MissingColumns(columns) => assert_eq!(
                columns,
                vec!["category", "number_in_stock", "description", "rating", "status"]
            ),
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bad_book_row_rolls_back_the_upload() {
        let db = testing::pool().await;
        let text = "name,isbn,author,category,number_in_stock,description,rating,status
Dune,100,Frank Herbert,Sci-Fi,4,,4.8,available
Emma,200,Jane Austen,Classics,two,,,
";
        let err = import_books(&db, text).await.unwrap_err();
        assert!(matches!(err, ReportError::InvalidRow { .. }));
        assert!(find_book_by_isbn(&db, "100").await.unwrap().is_none());
        assert!(list_categories(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fractional_stock_rejects_the_upload() {
        let db = testing::pool().await;
        for stock in ["2.9", "NaN", "1e300"] {
            let text = format!(
                "name,isbn,author,category,number_in_stock,description,rating,status
Dune,100,Frank Herbert,,{stock},,,
"
            );
            let err = import_books(&db, &text).await.unwrap_err();
            match err {
                ReportError::InvalidRow { line, message } => {
                    assert_eq!(line, 2);
                    assert!(message.contains("whole number"), "{message}");
                }
                other => panic!("expected an invalid row, got {other:?}"),
            }
        }
        assert!(find_book_by_isbn(&db, "100").await.unwrap().is_none());
    }
}
