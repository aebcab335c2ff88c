//! Reader and admin persistence.

use sqlx::{Executor, Sqlite, SqlitePool};

use super::models::{Admin, NewReader, Reader};
use crate::utils::{Page, PageParams};

pub async fn find_reader<'e, E>(db: E, id: i64) -> Result<Option<Reader>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM readers WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Look a reader up by library card number.
pub async fn find_reader_by_code<'e, E>(db: E, code: &str) -> Result<Option<Reader>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM readers WHERE reader_id = ?")
        .bind(code.trim())
        .fetch_optional(db)
        .await
}

pub async fn insert_reader<'e, E>(db: E, reader: &NewReader) -> Result<Reader, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "INSERT INTO readers
            (reader_id, name, date_of_birth, phone_number, address, is_staff_member, password_hash)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING *",
    )
    .bind(reader.reader_id.trim())
    .bind(reader.name.trim())
    .bind(reader.date_of_birth)
    .bind(&reader.phone_number)
    .bind(&reader.address)
    .bind(reader.is_staff_member)
    .bind(&reader.password_hash)
    .fetch_one(db)
    .await
}

/// Write back every mutable column of a loaded reader.
pub async fn save_reader(db: &SqlitePool, reader: &Reader) -> Result<Reader, sqlx::Error> {
    sqlx::query_as(
        "UPDATE readers
         SET reader_id = ?, name = ?, date_of_birth = ?, phone_number = ?, address = ?,
             is_staff_member = ?, is_active = ?, password_hash = ?
         WHERE id = ?
         RETURNING *",
    )
    .bind(&reader.reader_id)
    .bind(&reader.name)
    .bind(reader.date_of_birth)
    .bind(&reader.phone_number)
    .bind(&reader.address)
    .bind(reader.is_staff_member)
    .bind(reader.is_active)
    .bind(&reader.password_hash)
    .bind(reader.id)
    .fetch_one(db)
    .await
}

pub async fn delete_reader(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM readers WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_readers(
    db: &SqlitePool,
    params: &PageParams,
    per_page: i64,
) -> Result<Page<Reader>, sqlx::Error> {
    let total = count_readers(db).await?;
    let window = params.window(total, per_page);
    let items = sqlx::query_as("SELECT * FROM readers ORDER BY name COLLATE NOCASE, id LIMIT ? OFFSET ?")
        .bind(window.per_page)
        .bind(window.offset)
        .fetch_all(db)
        .await?;
    Ok(Page::new(items, window, total))
}

/// Every reader, for export.
pub async fn all_readers(db: &SqlitePool) -> Result<Vec<Reader>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM readers ORDER BY name COLLATE NOCASE, id")
        .fetch_all(db)
        .await
}

pub async fn count_readers(db: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM readers")
        .fetch_one(db)
        .await
}

/// Whether the reader still holds any unreturned book.
pub async fn has_open_issues(db: &SqlitePool, reader_id: i64) -> Result<bool, sqlx::Error> {
    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM issues WHERE reader_id = ? AND returned_date IS NULL",
    )
    .bind(reader_id)
    .fetch_one(db)
    .await?;
    Ok(open > 0)
}

pub async fn find_admin<'e, E>(db: E, id: i64) -> Result<Option<Admin>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as("SELECT * FROM admins WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_admin_by_code(db: &SqlitePool, code: &str) -> Result<Option<Admin>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM admins WHERE admin_id = ?")
        .bind(code.trim())
        .fetch_optional(db)
        .await
}

pub async fn insert_admin<'e, E>(
    db: E,
    admin_id: &str,
    name: &str,
    password_hash: &str,
    is_superuser: bool,
) -> Result<Admin, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        "INSERT INTO admins (admin_id, name, password_hash, is_superuser)
         VALUES (?, ?, ?, ?)
         RETURNING *",
    )
    .bind(admin_id.trim())
    .bind(name.trim())
    .bind(password_hash)
    .bind(is_superuser)
    .fetch_one(db)
    .await
}

pub async fn save_admin(db: &SqlitePool, admin: &Admin) -> Result<Admin, sqlx::Error> {
    sqlx::query_as(
        "UPDATE admins SET name = ?, password_hash = ?, is_active = ?
         WHERE id = ?
         RETURNING *",
    )
    .bind(&admin.name)
    .bind(&admin.password_hash)
    .bind(admin.is_active)
    .bind(admin.id)
    .fetch_one(db)
    .await
}

pub async fn delete_admin(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM admins WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_admins<'e, E>(db: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM admins")
        .fetch_one(db)
        .await
}

/// Active admins that are not superusers; capped by configuration.
pub async fn count_active_staff_admins<'e, E>(db: E) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar("SELECT COUNT(*) FROM admins WHERE is_active = 1 AND is_superuser = 0")
        .fetch_one(db)
        .await
}
