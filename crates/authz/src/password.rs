use crate::AuthError;

/// Hash a plaintext password with bcrypt at the given cost.
pub fn hash_password(plain: &str, cost: u32) -> Result<String, AuthError> {
    Ok(bcrypt::hash(plain, cost)?)
}

/// Check a plaintext password against a stored hash. Malformed hashes never verify.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    match bcrypt::verify(plain, hash) {
        Ok(valid) => valid,
        Err(err) => {
            tracing::warn!(target: "libris-authz", error = %err, "stored password hash is unreadable");
            false
        }
    }
}
