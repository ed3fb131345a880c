use bcrypt::{hash, verify};

use crate::error::AdalError;

pub fn hash_password(password: &str, cost: u32) -> Result<String, AdalError> {
    hash(password, cost).map_err(|e| AdalError::invariant("hash password", format!("Password hashing failed: {}", e)))
}

/// A malformed stored hash counts as a mismatch
pub fn verify_password(password: &str, hashed: &str) -> bool {
    verify(password, hashed).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hashed = hash_password("p@ss-W0rd", 4).unwrap();
        assert_ne!(hashed, "p@ss-W0rd");
        assert!(verify_password("p@ss-W0rd", &hashed));
        assert!(!verify_password("wrong", &hashed));
        assert!(!verify_password("p@ss-W0rd", "not-a-hash"));
    }
}
