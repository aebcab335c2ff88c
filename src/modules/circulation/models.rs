use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::modules::fines::models::FineView;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Issue {
    pub id: i64,
    pub reader_id: i64,
    pub book_id: i64,
    pub issued_date: NaiveDate,
    pub due_date: NaiveDate,
    pub returned_date: Option<NaiveDate>,
}

impl Issue {
    pub fn is_open(&self) -> bool {
        self.returned_date.is_none()
    }

    /// Whole days past the due date; zero when returned or not yet due.
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_open() {
            (today - self.due_date).num_days().max(0)
        } else {
            0
        }
    }
}

/// Issue joined with the book and reader it links.
#[derive(Debug, Clone, Serialize)]
pub struct IssueView {
    #[serde(flatten)]
    pub issue: Issue,
    pub book_name: String,
    pub book_isbn: String,
    pub reader_code: String,
    pub reader_name: String,
    pub is_overdue: bool,
    pub days_overdue: i64,
}

#[derive(Debug, FromRow)]
pub(crate) struct IssueRow {
    #[sqlx(flatten)]
    pub issue: Issue,
    pub book_name: String,
    pub book_isbn: String,
    pub reader_code: String,
    pub reader_name: String,
}

impl IssueView {
    pub(crate) fn new(row: IssueRow, today: NaiveDate) -> Self {
        let days_overdue = row.issue.days_overdue(today);
        Self {
            issue: row.issue,
            book_name: row.book_name,
            book_isbn: row.book_isbn,
            reader_code: row.reader_code,
            reader_name: row.reader_name,
            is_overdue: days_overdue > 0,
            days_overdue,
        }
    }
}

/// A reader's request to borrow; terminal once approved or rejected.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IssueRequest {
    pub id: i64,
    pub reader_id: i64,
    pub book_id: i64,
    pub request_date: DateTime<Utc>,
    pub approved: bool,
    pub rejected: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RequestView {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub request: IssueRequest,
    pub book_name: String,
    pub reader_code: String,
    pub reader_name: String,
}

/// Direct issuance by an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommand {
    pub reader_id: i64,
    pub book_id: i64,
    #[serde(default)]
    pub issued_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

impl IssueCommand {
    pub fn new(reader_id: i64, book_id: i64) -> Self {
        Self {
            reader_id,
            book_id,
            issued_date: None,
            due_date: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub book_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestIds {
    pub request_ids: Vec<i64>,
}

/// Result of approving a request: either it became an issue or the
/// rules no longer allowed it and it was rejected.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Approval {
    Issued { issue: Issue },
    Rejected { request: IssueRequest, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub request_id: i64,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReaderDashboard {
    pub issues: Vec<IssueView>,
    pub pending_requests: Vec<RequestView>,
    pub unpaid_fines: Vec<FineView>,
    pub unread_notifications: i64,
}
