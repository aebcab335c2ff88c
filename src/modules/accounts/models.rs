use chrono::NaiveDate;
use libris_http::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;

use crate::modules::catalog::models::Book;
use crate::modules::circulation::models::IssueView;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Reader {
    pub id: i64,
    /// Library card number readers log in with
    pub reader_id: String,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone_number: String,
    pub address: String,
    /// Staff and teachers get the long loan period
    pub is_staff_member: bool,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Admin {
    pub id: i64,
    pub admin_id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_superuser: bool,
}

/// Fully validated reader ready to insert.
#[derive(Debug, Clone)]
pub struct NewReader {
    pub reader_id: String,
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone_number: String,
    pub address: String,
    pub is_staff_member: bool,
    pub password_hash: String,
}

/// Self-service sign-up form.
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderRegistration {
    pub reader_id: String,
    pub name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub is_staff_member: bool,
    pub password: String,
    pub password_confirm: String,
}

impl ReaderRegistration {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut details = required(&[("reader_id", &self.reader_id), ("name", &self.name)]);
        if self.password.is_empty() {
            details.push(json!({"field": "password", "error": "required"}));
        } else if self.password != self.password_confirm {
            details.push(json!({"field": "password_confirm", "error": "Passwords do not match."}));
        }
        details.extend(phone_error(&self.phone_number));
        finish(details, "invalid registration")
    }
}

/// Reader record as entered by an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderForm {
    pub reader_id: String,
    pub name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub is_staff_member: bool,
    /// Falls back to the configured temporary password
    #[serde(default)]
    pub password: Option<String>,
}

impl ReaderForm {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut details = required(&[("reader_id", &self.reader_id), ("name", &self.name)]);
        details.extend(phone_error(&self.phone_number));
        finish(details, "invalid reader")
    }
}

/// Partial edit of a reader by an admin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReaderUpdate {
    pub reader_id: Option<String>,
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub is_staff_member: Option<bool>,
}

impl ReaderUpdate {
    pub fn apply(self, reader: &mut Reader) -> Result<(), AppError> {
        let mut details = Vec::new();
        if let Some(code) = self.reader_id {
            if code.trim().is_empty() {
                details.push(json!({"field": "reader_id", "error": "required"}));
            }
            reader.reader_id = code.trim().to_string();
        }
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                details.push(json!({"field": "name", "error": "required"}));
            }
            reader.name = name.trim().to_string();
        }
        if let Some(phone) = self.phone_number {
            details.extend(phone_error(&phone));
            reader.phone_number = phone;
        }
        if self.date_of_birth.is_some() {
            reader.date_of_birth = self.date_of_birth;
        }
        if let Some(address) = self.address {
            reader.address = address;
        }
        if let Some(staff) = self.is_staff_member {
            reader.is_staff_member = staff;
        }
        finish(details, "invalid reader")
    }
}

/// Fields a reader may change on their own profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

impl From<ProfileUpdate> for ReaderUpdate {
    fn from(profile: ProfileUpdate) -> Self {
        Self {
            name: profile.name,
            date_of_birth: profile.date_of_birth,
            phone_number: profile.phone_number,
            address: profile.address,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChange {
    /// Shape check only; the current password is verified against the stored hash.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.new_password.is_empty() || self.new_password != self.confirm_password {
            return Err(AppError::field("confirm_password", "New passwords do not match."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderLogin {
    pub reader_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminLogin {
    pub admin_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminRegistration {
    pub admin_id: String,
    pub name: String,
    pub password: String,
}

impl AdminRegistration {
    pub fn validate(&self) -> Result<(), AppError> {
        let details = required(&[
            ("admin_id", &self.admin_id),
            ("name", &self.name),
            ("password", &self.password),
        ]);
        finish(details, "invalid admin")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminProfileUpdate {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub admin: Admin,
    pub total_books: i64,
    pub total_readers: i64,
    pub low_stock_books: Vec<Book>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReaderDetails {
    pub reader: Reader,
    pub issues: Vec<IssueView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReaderProfile {
    pub reader: Reader,
    pub unread_notifications: i64,
}

fn required(fields: &[(&str, &String)]) -> Vec<Value> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| json!({"field": field, "error": "required"}))
        .collect()
}

/// Phone numbers are optional but must be exactly ten digits when present.
fn phone_error(phone: &str) -> Option<Value> {
    if phone.is_empty() || (phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit())) {
        None
    } else {
        Some(json!({"field": "phone_number", "error": "Phone number must be exactly 10 digits."}))
    }
}

fn finish(details: Vec<Value>, message: &str) -> Result<(), AppError> {
    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(details, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> ReaderRegistration {
        ReaderRegistration {
            reader_id: "R100".into(),
            name: "Ann".into(),
            date_of_birth: None,
            phone_number: "0123456789".into(),
            address: String::new(),
            is_staff_member: false,
            password: "pw".into(),
            password_confirm: "pw".into(),
        }
    }

    fn fields(err: AppError) -> Vec<String> {
        match err {
            AppError::Validation { details, .. } => details
                .iter()
                .map(|d| d["field"].as_str().unwrap().to_string())
                .collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn registration_accepts_valid_form() {
        assert!(registration().validate().is_ok());
    }

    #[test]
    fn registration_rejects_mismatch_and_bad_phone() {
        let mut form = registration();
        form.password_confirm = "other".into();
        form.phone_number = "12345".into();
        assert_eq!(
            fields(form.validate().unwrap_err()),
            vec!["password_confirm", "phone_number"]
        );
    }

    #[test]
    fn phone_must_be_digits() {
        assert!(phone_error("01234abcde").is_some());
        assert!(phone_error("").is_none());
    }

    #[test]
    fn password_change_requires_matching_new_passwords() {
        let change = PasswordChange {
            current_password: "old".into(),
            new_password: "".into(),
            confirm_password: "".into(),
        };
        assert!(change.validate().is_err());
    }

    #[test]
    fn reader_update_applies_only_given_fields() {
        let mut reader = Reader {
            id: 1,
            reader_id: "R1".into(),
            name: "Ann".into(),
            date_of_birth: None,
            phone_number: String::new(),
            address: "Old Street".into(),
            is_staff_member: false,
            is_active: true,
            password_hash: String::new(),
        };
        ReaderUpdate {
            name: Some("Annie".into()),
            is_staff_member: Some(true),
            ..ReaderUpdate::default()
        }
        .apply(&mut reader)
        .unwrap();
        assert_eq!(reader.name, "Annie");
        assert!(reader.is_staff_member);
        assert_eq!(reader.address, "Old Street");
    }
}
