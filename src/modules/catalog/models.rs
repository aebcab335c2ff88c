use libris_http::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;

use crate::modules::analytics::models::BookAnalytics;

/// Shelf state of a title, maintained by admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Available,
    Issued,
    Lost,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Book {
    pub id: i64,
    pub name: String,
    pub isbn: String,
    pub author: String,
    pub category_id: Option<i64>,
    /// Copies on the shelf right now
    pub number_in_stock: i64,
    pub description: String,
    /// Base rating assigned by the library, 1.0 - 5.0
    pub rating: f64,
    pub status: BookStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Book row as shown in listings and search results.
#[derive(Debug, Clone, Serialize)]
pub struct BookListing {
    #[serde(flatten)]
    pub book: Book,
    pub category_name: Option<String>,
    pub avg_reader_rating: f64,
    pub combined_rating: f64,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct BookListingRow {
    #[sqlx(flatten)]
    pub book: Book,
    pub category_name: Option<String>,
    pub reader_avg: Option<f64>,
}

impl From<BookListingRow> for BookListing {
    fn from(row: BookListingRow) -> Self {
        let ratings = RatingSummary::new(row.book.rating, row.reader_avg, None);
        Self {
            book: row.book,
            category_name: row.category_name,
            avg_reader_rating: ratings.avg_reader_rating,
            combined_rating: ratings.combined_rating,
        }
    }
}

/// Compact search hit for type-ahead widgets.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub pk: i64,
    pub name: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub category_id: Option<i64>,
    pub stock: i64,
    pub avg_reader_rating: f64,
    pub combined_rating: f64,
    pub description: String,
}

const SNIPPET_CHARS: usize = 180;

impl From<BookListing> for SearchHit {
    fn from(listing: BookListing) -> Self {
        Self {
            pk: listing.book.id,
            name: listing.book.name,
            author: listing.book.author,
            isbn: listing.book.isbn,
            category: listing.category_name.unwrap_or_default(),
            category_id: listing.book.category_id,
            stock: listing.book.number_in_stock,
            avg_reader_rating: listing.avg_reader_rating,
            combined_rating: listing.combined_rating,
            description: listing.book.description.chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

/// Base rating blended with what readers think of the book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub avg_reader_rating: f64,
    pub combined_rating: f64,
    pub user_rating: Option<f64>,
}

impl RatingSummary {
    /// With no reader ratings the reader average falls back to the base rating.
    pub fn new(base: f64, reader_avg: Option<f64>, user_rating: Option<f64>) -> Self {
        let avg = reader_avg.unwrap_or(base);
        Self {
            avg_reader_rating: crate::utils::round1(avg),
            combined_rating: crate::utils::round1((base + avg) / 2.0),
            user_rating,
        }
    }
}

/// Create/replace payload for a book.
#[derive(Debug, Clone, Deserialize)]
pub struct BookInput {
    pub name: String,
    pub isbn: String,
    pub author: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub number_in_stock: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub status: Option<BookStatus>,
}

pub const DEFAULT_RATING: f64 = 4.0;

impl BookInput {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut details = Vec::new();
        for (field, value) in [
            ("name", &self.name),
            ("isbn", &self.isbn),
            ("author", &self.author),
        ] {
            if value.trim().is_empty() {
                details.push(json!({"field": field, "error": "required"}));
            }
        }
        if self.number_in_stock < 0 {
            details.push(json!({"field": "number_in_stock", "error": "must not be negative"}));
        }
        if let Some(rating) = self.rating {
            if !(1.0..=5.0).contains(&rating) {
                details.push(json!({"field": "rating", "error": "must be between 1.0 and 5.0"}));
            }
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(details, "invalid book"))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
}

/// Search/filter query for listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookFilter {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Option<i64>,
}

impl BookFilter {
    pub fn query(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// Set category and/or status on many books at once.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkBookUpdate {
    pub book_ids: Vec<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub status: Option<BookStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingInput {
    pub rating: f64,
}

impl RatingInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if (1.0..=5.0).contains(&self.rating) {
            Ok(())
        } else {
            Err(AppError::field("rating", "Rating must be between 1 and 5."))
        }
    }
}

/// `?q=&category=&limit=` for the type-ahead endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl SearchParams {
    pub fn filter(&self) -> BookFilter {
        BookFilter {
            q: self.q.clone(),
            category: self.category,
        }
    }
}

/// Everything the book page shows.
#[derive(Debug, Clone, Serialize)]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: Book,
    pub category_name: Option<String>,
    pub ratings: RatingSummary,
    pub analytics: BookAnalytics,
    pub popular_books: Vec<Book>,
}
