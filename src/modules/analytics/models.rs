use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IssuanceRecord {
    pub date: NaiveDate,
    pub quantity_issued: i64,
}

/// Issue counts for one book over a trailing window, ready for charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookAnalytics {
    pub book_id: i64,
    pub days: i64,
    pub dates: Vec<NaiveDate>,
    pub quantities: Vec<i64>,
    pub total_issued: i64,
    /// Average over the days that have a record.
    pub avg_per_day: f64,
}

impl BookAnalytics {
    pub fn from_records(book_id: i64, days: i64, records: Vec<IssuanceRecord>) -> Self {
        let total_issued: i64 = records.iter().map(|r| r.quantity_issued).sum();
        let avg_per_day = if records.is_empty() {
            0.0
        } else {
            total_issued as f64 / records.len() as f64
        };
        let (dates, quantities) = records
            .into_iter()
            .map(|r| (r.date, r.quantity_issued))
            .unzip();
        Self {
            book_id,
            days,
            dates,
            quantities,
            total_issued,
            avg_per_day,
        }
    }
}
