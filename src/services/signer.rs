// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HMAC-SHA256 signing for cookie tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Signs strings with the server secret.
///
/// Holds nothing but the key; a fresh MAC is built per call so one signer
/// can be shared freely.
#[derive(Clone)]
pub struct Signer {
    secret: Option<Vec<u8>>,
}

impl Signer {
    pub fn new(secret: Option<&[u8]>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()).map(<[u8]>::to_vec),
        }
    }

    /// URL-safe base64 HMAC of `value`, or `None` when no secret is
    /// configured. Callers must fail closed on `None`.
    pub fn sign(&self, value: &str) -> Option<String> {
        let secret = self.secret.as_deref()?;
        let mut mac = HmacSha256::new_from_slice(secret).ok()?;
        mac.update(value.as_bytes());
        Some(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Recompute the signature of `value` and compare in constant time.
    pub fn verify(&self, value: &str, signature: &str) -> bool {
        match self.sign(value) {
            Some(expected) => timing_safe_eq(&expected, signature),
            None => false,
        }
    }
}

/// Constant-time string comparison. Lengths are compared up front.
pub fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
