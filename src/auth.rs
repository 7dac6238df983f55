use sha2::{Digest, Sha256};

/// Shared-secret gate for the admin surface. Secrets are compared by SHA-256
/// digest so the comparison length never depends on the presented value.
pub struct AdminSecret {
    digest: [u8; 32],
}

impl AdminSecret {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: Sha256::digest(secret.as_bytes()).into(),
        }
    }

    pub fn verify(&self, presented: &str) -> bool {
        let presented: [u8; 32] = Sha256::digest(presented.as_bytes()).into();
        presented == self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_secret() {
        let gate = AdminSecret::new("hunter2");
        assert!(gate.verify("hunter2"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let gate = AdminSecret::new("hunter2");
        assert!(!gate.verify("hunter3"));
        assert!(!gate.verify(""));
    }
}
