//! Credential hashing and cookie-backed sessions for readers and admins.

pub mod password;
pub mod session;

pub use password::{hash_password, verify_password};
pub use session::{migrations, Principal, PrincipalKind, SessionStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
