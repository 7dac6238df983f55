//! Cancellation tokens. A token is the sole authentication for self-service
//! cancellation: 128 bits from the OS RNG, hex-encoded, stored alongside the
//! reservation and never derived from any booking field.

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

const TOKEN_BYTES: usize = 16;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CancelToken(String);

impl CancelToken {
    /// Mint a fresh token.
    pub fn mint() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are secrets — keep them out of debug output and logs.
impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CancelToken(..)")
    }
}
