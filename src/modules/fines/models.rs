use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

/// Penalty for one overdue issue. The amount is fixed when first assessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Fine {
    pub id: i64,
    pub issue_id: i64,
    pub amount: i64,
    pub paid: bool,
    pub calculated_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FineView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fine: Fine,
    pub reader_id: i64,
    pub reader_code: String,
    pub reader_name: String,
    pub book_name: String,
    pub due_date: NaiveDate,
}

/// What a sweep created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub fines_created: u64,
    pub due_soon_notices: u64,
    pub overdue_notices: u64,
}
