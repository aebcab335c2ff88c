//! CSV renderings of issues, fines and readers.

use csv::WriterBuilder;
use serde::Serialize;

use super::error::ReportError;
use crate::modules::accounts::models::Reader;
use crate::modules::circulation::models::IssueView;
use crate::modules::fines::models::FineView;

const ISSUE_HEADERS: [&str; 8] = [
    "Reader Name",
    "Reader ID",
    "Book Name",
    "ISBN",
    "Issued Date",
    "Due Date",
    "Returned Date",
    "Status",
];
const FINE_HEADERS: [&str; 6] = [
    "Reader Name",
    "Reader ID",
    "Book Name",
    "Amount",
    "Calculated Date",
    "Status",
];
const READER_HEADERS: [&str; 7] = [
    "Reader ID",
    "Name",
    "Date of Birth",
    "Phone",
    "Address",
    "Status",
    "Role",
];

#[derive(Serialize)]
struct IssueLine<'a> {
    reader_name: &'a str,
    reader_code: &'a str,
    book_name: &'a str,
    isbn: &'a str,
    issued_date: String,
    due_date: String,
    returned_date: String,
    status: &'static str,
}

#[derive(Serialize)]
struct FineLine<'a> {
    reader_name: &'a str,
    reader_code: &'a str,
    book_name: &'a str,
    amount: i64,
    calculated_date: String,
    status: &'static str,
}

#[derive(Serialize)]
struct ReaderLine<'a> {
    reader_code: &'a str,
    name: &'a str,
    date_of_birth: String,
    phone: &'a str,
    address: &'a str,
    status: &'static str,
    role: &'static str,
}

fn render<T, I>(headers: &[&str], rows: I) -> Result<String, ReportError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn issues_csv(issues: &[IssueView]) -> Result<String, ReportError> {
    render(
        &ISSUE_HEADERS,
        issues.iter().map(|view| {
            let returned = view.issue.returned_date;
            IssueLine {
                reader_name: &view.reader_name,
                reader_code: &view.reader_code,
                book_name: &view.book_name,
                isbn: &view.book_isbn,
                issued_date: view.issue.issued_date.to_string(),
                due_date: view.issue.due_date.to_string(),
                returned_date: returned
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "Not Returned".to_string()),
                status: if returned.is_some() { "Returned" } else { "Not Returned" },
            }
        }),
    )
}

pub fn fines_csv(fines: &[FineView]) -> Result<String, ReportError> {
    render(
        &FINE_HEADERS,
        fines.iter().map(|view| FineLine {
            reader_name: &view.reader_name,
            reader_code: &view.reader_code,
            book_name: &view.book_name,
            amount: view.fine.amount,
            calculated_date: view.fine.calculated_date.to_string(),
            status: if view.fine.paid { "Paid" } else { "Unpaid" },
        }),
    )
}

pub fn readers_csv(readers: &[Reader]) -> Result<String, ReportError> {
    render(
        &READER_HEADERS,
        readers.iter().map(|reader| ReaderLine {
            reader_code: &reader.reader_id,
            name: &reader.name,
            date_of_birth: reader
                .date_of_birth
                .map(|d| d.to_string())
                .unwrap_or_default(),
            phone: &reader.phone_number,
            address: &reader.address,
            status: if reader.is_active { "Active" } else { "Inactive" },
            role: if reader.is_staff_member { "Staff/Teacher" } else { "Student" },
        }),
    )
}
