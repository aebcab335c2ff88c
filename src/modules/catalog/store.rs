//! Book, category and rating persistence.

use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::models::{
    Book, BookFilter, BookInput, BookListing, BookListingRow, BulkBookUpdate, Category,
    RatingSummary, DEFAULT_RATING,
};
use crate::utils::{like_contains, like_prefix, Page, PageParams};

const SEARCH_WHERE: &str = r"
    WHERE (?1 IS NULL
           OR b.name LIKE ?2 ESCAPE '\'
           OR b.author LIKE ?2 ESCAPE '\'
           OR b.isbn LIKE ?2 ESCAPE '\')
      AND (?3 IS NULL OR b.category_id = ?3)";

// Name prefix beats name substring beats author prefix, and so on down to ISBN.
const SEARCH_ORDER: &str = r"
    ORDER BY CASE
        WHEN ?1 IS NULL THEN 0
        WHEN b.name LIKE ?4 ESCAPE '\' THEN 0
        WHEN b.name LIKE ?2 ESCAPE '\' THEN 1
        WHEN b.author LIKE ?4 ESCAPE '\' THEN 2
        WHEN b.author LIKE ?2 ESCAPE '\' THEN 3
        WHEN b.isbn LIKE ?4 ESCAPE '\' THEN 4
        WHEN b.isbn LIKE ?2 ESCAPE '\' THEN 5
        ELSE 6
    END, b.name COLLATE NOCASE, b.id";

pub async fn find_book<'e, E>(db: E, id: i64) -> Result<Option<Book>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM books WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_book_by_isbn<'e, E>(db: E, isbn: &str) -> Result<Option<Book>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM books WHERE isbn = ?")
        .bind(isbn)
        .fetch_optional(db)
        .await
}

/// Filtered, prioritised, paginated listing.
pub async fn list_books(
    db: &SqlitePool,
    filter: &BookFilter,
    params: &PageParams,
    per_page: i64,
) -> Result<Page<BookListing>, sqlx::Error> {
    let q = filter.query();
    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM books b {SEARCH_WHERE}"))
        .bind(q)
        .bind(q.map(like_contains))
        .bind(filter.category)
        .fetch_one(db)
        .await?;

    let window = params.window(total, per_page);
    let items = fetch_listings(db, filter, window.per_page, window.offset).await?;
    Ok(Page::new(items, window, total))
}

/// First `limit` matches for type-ahead search.
pub async fn search_books(
    db: &SqlitePool,
    filter: &BookFilter,
    limit: i64,
) -> Result<Vec<BookListing>, sqlx::Error> {
    fetch_listings(db, filter, limit.max(0), 0).await
}

async fn fetch_listings(
    db: &SqlitePool,
    filter: &BookFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<BookListing>, sqlx::Error> {
    let q = filter.query();
    let sql = format!(
        "SELECT b.*, c.name AS category_name,
                (SELECT AVG(r.rating) FROM book_ratings r WHERE r.book_id = b.id) AS reader_avg
         FROM books b
         LEFT JOIN categories c ON c.id = b.category_id
         {SEARCH_WHERE}
         {SEARCH_ORDER}
         LIMIT ?5 OFFSET ?6"
    );

    let rows: Vec<BookListingRow> = sqlx::query_as(&sql)
        .bind(q)
        .bind(q.map(like_contains))
        .bind(filter.category)
        .bind(q.map(like_prefix))
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;

    Ok(rows.into_iter().map(BookListing::from).collect())
}

pub async fn create_book<'e, E>(db: E, input: &BookInput) -> Result<Book, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "INSERT INTO books (name, isbn, author, category_id, number_in_stock, description, rating, status)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING *",
    )
    .bind(input.name.trim())
    .bind(input.isbn.trim())
    .bind(input.author.trim())
    .bind(input.category_id)
    .bind(input.number_in_stock)
    .bind(input.description.as_deref().unwrap_or_default())
    .bind(input.rating.unwrap_or(DEFAULT_RATING))
    .bind(input.status.unwrap_or_default())
    .fetch_one(db)
    .await
}

pub async fn update_book<'e, E>(
    db: E,
    id: i64,
    input: &BookInput,
) -> Result<Option<Book>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "UPDATE books
         SET name = ?, isbn = ?, author = ?, category_id = ?, number_in_stock = ?,
             description = ?, rating = ?, status = ?
         WHERE id = ?
         RETURNING *",
    )
    .bind(input.name.trim())
    .bind(input.isbn.trim())
    .bind(input.author.trim())
    .bind(input.category_id)
    .bind(input.number_in_stock)
    .bind(input.description.as_deref().unwrap_or_default())
    .bind(input.rating.unwrap_or(DEFAULT_RATING))
    .bind(input.status.unwrap_or_default())
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn delete_book(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM books WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Apply category/status to the selected books. An unknown category is ignored.
pub async fn bulk_update(db: &SqlitePool, update: &BulkBookUpdate) -> Result<u64, sqlx::Error> {
    let category_id = match update.category_id {
        Some(id) => find_category(db, id).await?.map(|c| c.id),
        None => None,
    };
    if update.book_ids.is_empty() || (category_id.is_none() && update.status.is_none()) {
        return Ok(0);
    }

    let mut qb = QueryBuilder::<Sqlite>::new("UPDATE books SET ");
    {
        let mut assignments = qb.separated(", ");
        if let Some(category_id) = category_id {
            assignments.push("category_id = ");
            assignments.push_bind_unseparated(category_id);
        }
        if let Some(status) = update.status {
            assignments.push("status = ");
            assignments.push_bind_unseparated(status);
        }
    }
    qb.push(" WHERE id IN (");
    {
        let mut ids = qb.separated(", ");
        for id in &update.book_ids {
            ids.push_bind(*id);
        }
    }
    qb.push(")");

    Ok(qb.build().execute(db).await?.rows_affected())
}

/// Books with at most one copy left, scarcest first.
pub async fn low_stock(db: &SqlitePool, limit: i64) -> Result<Vec<Book>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM books WHERE number_in_stock <= 1
         ORDER BY number_in_stock, name COLLATE NOCASE
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(db)
    .await
}

pub async fn count_books(db: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(db)
        .await
}

pub async fn list_categories(db: &SqlitePool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as("SELECT id, name FROM categories ORDER BY name COLLATE NOCASE")
        .fetch_all(db)
        .await
}

pub async fn find_category<'e, E>(db: E, id: i64) -> Result<Option<Category>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT id, name FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create_category(db: &SqlitePool, name: &str) -> Result<Category, sqlx::Error> {
    sqlx::query_as("INSERT INTO categories (name) VALUES (?) RETURNING id, name")
        .bind(name.trim())
        .fetch_one(db)
        .await
}

pub async fn rename_category(
    db: &SqlitePool,
    id: i64,
    name: &str,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as("UPDATE categories SET name = ? WHERE id = ? RETURNING id, name")
        .bind(name.trim())
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Delete a category; its books become uncategorised.
pub async fn delete_category(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Id of the category with this name, creating it when missing.
pub async fn category_id_for_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query("INSERT INTO categories (name) VALUES (?) ON CONFLICT (name) DO NOTHING")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    sqlx::query_scalar("SELECT id FROM categories WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
}

/// Insert or replace a reader's rating of a book.
pub async fn upsert_rating(
    db: &SqlitePool,
    book_id: i64,
    reader_id: i64,
    rating: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO book_ratings (book_id, reader_id, rating) VALUES (?, ?, ?)
         ON CONFLICT (book_id, reader_id) DO UPDATE SET rating = excluded.rating",
    )
    .bind(book_id)
    .bind(reader_id)
    .bind(rating)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn rating_summary(
    db: &SqlitePool,
    book: &Book,
    reader_id: Option<i64>,
) -> Result<RatingSummary, sqlx::Error> {
    let reader_avg: Option<f64> =
        sqlx::query_scalar("SELECT AVG(rating) FROM book_ratings WHERE book_id = ?")
            .bind(book.id)
            .fetch_one(db)
            .await?;

    let user_rating: Option<f64> = match reader_id {
        Some(reader_id) => {
            sqlx::query_scalar("SELECT rating FROM book_ratings WHERE book_id = ? AND reader_id = ?")
                .bind(book.id)
                .bind(reader_id)
                .fetch_optional(db)
                .await?
        }
        None => None,
    };

    Ok(RatingSummary::new(book.rating, reader_avg, user_rating))
}
