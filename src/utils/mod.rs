//! Small helpers shared by the domain modules.

use chrono::{Duration, Local, NaiveDate};
use libris_http::error::AppError;
use serde::{Deserialize, Serialize};

/// The library's local calendar day.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `date` moved by `days`, or `None` when the result leaves the calendar.
pub fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

/// Wrap any error as a 500.
pub fn internal<E>(err: E) -> AppError
where
    E: std::error::Error + Send + Sync + 'static,
{
    AppError::Internal(anyhow::Error::from(err))
}

/// True when a statement tripped a UNIQUE constraint or index.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// `?page=N` query parameter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
}

/// Resolved slice of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub page: i64,
    pub per_page: i64,
    pub offset: i64,
}

impl PageParams {
    /// Clamp the requested page into `1..=last_page`; an empty listing has one empty page.
    pub fn window(&self, total: i64, per_page: i64) -> Window {
        let per_page = per_page.max(1);
        let last_page = total_pages(total, per_page).max(1);
        let page = self.page.unwrap_or(1).clamp(1, last_page);
        Window {
            page,
            per_page,
            offset: (page - 1) * per_page,
        }
    }
}

fn total_pages(total: i64, per_page: i64) -> i64 {
    (total + per_page - 1) / per_page
}

/// One page of a listing plus the numbers a pager needs.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: Window, total: i64) -> Self {
        Self {
            items,
            page: window.page,
            per_page: window.per_page,
            total,
            total_pages: total_pages(total, window.per_page),
        }
    }
}

/// Round to one decimal place, the precision ratings are shown with.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `LIKE` pattern matching `needle` anywhere, with wildcards in the needle escaped.
pub fn like_contains(needle: &str) -> String {
    format!("%{}%", escape_like(needle))
}

/// `LIKE` pattern matching values that start with `needle`.
pub fn like_prefix(needle: &str) -> String {
    format!("{}%", escape_like(needle))
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
