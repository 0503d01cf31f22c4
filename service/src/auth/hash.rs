//! Password hashing (spec.md §1 "password hashing (bcrypt)"),
//! mirroring `sign/auth/hash.py`.

const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

pub fn hash_password(plain: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plain, DEFAULT_COST)
}

pub fn verify_password(plain: &str, hashed: &str) -> bool {
    bcrypt::verify(plain, hashed).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_password() {
        let hashed = hash_password("test").unwrap();
        assert!(verify_password("test", &hashed));
        assert!(!verify_password("wrong", &hashed));
    }
}
