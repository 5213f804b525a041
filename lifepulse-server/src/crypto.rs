//! Hashing and code generation

use rand::Rng;

use crate::error::ServerError;

/// Default bcrypt cost factor for OTP hashes
pub const BCRYPT_COST: u32 = 10;

/// Slow, salted one-way hashing of short secrets
pub trait Hasher: Send + Sync {
    /// Hash a plaintext secret
    fn hash(&self, plaintext: &str) -> Result<String, ServerError>;

    /// Check a plaintext secret against a stored hash
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, ServerError>;
}

/// bcrypt-backed hasher
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(BCRYPT_COST)
    }
}

impl Hasher for BcryptHasher {
    fn hash(&self, plaintext: &str) -> Result<String, ServerError> {
        bcrypt::hash(plaintext, self.cost).map_err(ServerError::dependency)
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, ServerError> {
        bcrypt::verify(plaintext, hash).map_err(ServerError::dependency)
    }
}

/// Generate a random 6-digit code, uniform over 100000..=999999
pub fn generate_otp_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100000..1000000);
    code.to_string()
}

/// Generate a short public reference such as a donor or request code
pub fn generate_public_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
