//! bcrypt password hashing, run on the blocking pool so request tasks never
//! stall on the key schedule.

use crate::error::AppError;

pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hash task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("hash failed: {e}")))
}

/// Returns `Ok(false)` on a mismatch. A malformed stored hash is an internal error.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verify task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("verify failed: {e}")))
}
