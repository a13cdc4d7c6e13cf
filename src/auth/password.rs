use crate::error::AppError;
use bcrypt::{hash, verify};

/// bcrypt hashing with a configurable work factor.
///
/// Production uses `bcrypt::DEFAULT_COST`; tests drop to the minimum cost so
/// registration stays fast.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        hash(password, self.cost)
            .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
    }

    /// Returns `Ok(false)` on mismatch; a malformed stored hash is an error.
    pub fn verify(&self, password: &str, hashed_password: &str) -> Result<bool, AppError> {
        verify(password, hashed_password).map_err(|e| {
            AppError::InternalServerError(format!("Failed to verify password: {}", e))
        })
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}
