// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Time-limited signed URLs
//!
//! A signed URL has the form
//! `{base}/{locator}?expires={unix}&signature={sig}` where `sig` is the
//! unpadded URL-safe base64 of `HMAC-SHA256(key, locator "\n" expires)`.
//! Whatever serves `base` verifies the signature with the same key.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::{StorageError, locator_segments};

type HmacSha256 = Hmac<Sha256>;

/// A URL granting temporary access to one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: Url,
    pub expires_at: DateTime<Utc>,
}

/// Signs object URLs under a base URL with a shared key.
#[derive(Clone)]
pub struct UrlSigner {
    base_url: Url,
    key: String,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url.as_str())
            .field("key", &"****")
            .finish()
    }
}

impl UrlSigner {
    pub fn new(base_url: Url, key: String) -> Result<Self, StorageError> {
        if key.is_empty() {
            return Err(StorageError::Config("signing key must not be empty".to_string()));
        }
        if base_url.cannot_be_a_base() {
            return Err(StorageError::Config(format!(
                "cannot sign under non-hierarchical URL {}",
                base_url
            )));
        }
        Ok(Self { base_url, key })
    }

    /// Sign `locator` for `ttl` starting now.
    pub fn sign(&self, locator: &str, ttl: Duration) -> Result<SignedUrl, StorageError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| StorageError::Config(format!("invalid signing ttl: {}", e)))?;
        self.sign_until(locator, Utc::now() + ttl)
    }

    /// Sign `locator` with an explicit expiry.
    pub fn sign_until(
        &self,
        locator: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<SignedUrl, StorageError> {
        let mut url = object_url(&self.base_url, locator)?;
        let expires = expires_at.timestamp();
        let tag = self.mac(locator, expires)?.finalize().into_bytes();
        let signature = URL_SAFE_NO_PAD.encode(tag);

        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);

        Ok(SignedUrl { url, expires_at })
    }

    /// Check a signature presented for `locator` at time `now`.
    ///
    /// The comparison is constant-time.
    pub fn verify(&self, locator: &str, expires: i64, signature: &str, now: DateTime<Utc>) -> bool {
        if now.timestamp() > expires {
            return false;
        }
        let Ok(presented) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        match self.mac(locator, expires) {
            Ok(mac) => mac.verify_slice(&presented).is_ok(),
            Err(_) => false,
        }
    }

    fn mac(&self, locator: &str, expires: i64) -> Result<HmacSha256, StorageError> {
        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes())
            .map_err(|e| StorageError::Config(format!("invalid signing key: {}", e)))?;
        mac.update(locator.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }
}

/// Append a locator's segments to `base`, percent-encoding each one.
pub(crate) fn object_url(base: &Url, locator: &str) -> Result<Url, StorageError> {
    let segments = locator_segments(locator)?;
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| StorageError::Config(format!("cannot append a path to {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new(
            Url::parse("https://cdn.example.com/media/").unwrap(),
            "s3cret".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_object_url_encodes_segments() {
        let base = Url::parse("http://objects.local/root").unwrap();
        let url = object_url(&base, "alice/my photo.jpg").unwrap();
        assert_eq!(url.as_str(), "http://objects.local/root/alice/my%20photo.jpg");

        let base = Url::parse("http://objects.local/root/").unwrap();
        let url = object_url(&base, "a/b.bin").unwrap();
        assert_eq!(url.as_str(), "http://objects.local/root/a/b.bin");
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = signer();
        let expires_at = Utc::now() + chrono::Duration::seconds(300);
        let signed = signer.sign_until("alice/1.jpg", expires_at).unwrap();

        assert!(
            signed
                .url
                .as_str()
                .starts_with("https://cdn.example.com/media/alice/1.jpg?expires=")
        );

        let pairs: std::collections::HashMap<String, String> =
            signed.url.query_pairs().into_owned().collect();
        let expires: i64 = pairs["expires"].parse().unwrap();
        assert_eq!(expires, expires_at.timestamp());
        assert!(signer.verify("alice/1.jpg", expires, &pairs["signature"], Utc::now()));

        // Different object or tampered expiry must not verify
        assert!(!signer.verify("alice/2.jpg", expires, &pairs["signature"], Utc::now()));
        assert!(!signer.verify(
            "alice/1.jpg",
            expires + 60,
            &pairs["signature"],
            Utc::now()
        ));
    }

    #[test]
    fn test_verify_rejects_altered_signatures() {
        let signer = signer();
        let expires_at = Utc::now() + chrono::Duration::seconds(300);
        let signed = signer.sign_until("alice/1.jpg", expires_at).unwrap();
        let pairs: std::collections::HashMap<String, String> =
            signed.url.query_pairs().into_owned().collect();
        let signature = &pairs["signature"];
        let expires = expires_at.timestamp();

        let truncated = &signature[..signature.len() - 1];
        assert!(!signer.verify("alice/1.jpg", expires, truncated, Utc::now()));
        assert!(!signer.verify("alice/1.jpg", expires, "", Utc::now()));
        assert!(!signer.verify("alice/1.jpg", expires, "not base64!", Utc::now()));

        // Same locator and expiry under another key
        let other = UrlSigner::new(
            Url::parse("https://cdn.example.com/media/").unwrap(),
            "other".to_string(),
        )
        .unwrap();
        assert!(!other.verify("alice/1.jpg", expires, signature, Utc::now()));
    }

    #[test]
    fn test_verify_rejects_expired() {
        let signer = signer();
        let expires_at = Utc::now() - chrono::Duration::seconds(1);
        let signed = signer.sign_until("x.bin", expires_at).unwrap();
        let pairs: std::collections::HashMap<String, String> =
            signed.url.query_pairs().into_owned().collect();
        assert!(!signer.verify(
            "x.bin",
            expires_at.timestamp(),
            &pairs["signature"],
            Utc::now()
        ));
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = UrlSigner::new(Url::parse("http://x/").unwrap(), String::new());
        assert!(matches!(result, Err(StorageError::Config(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", signer());
        assert!(!rendered.contains("s3cret"));
    }
}
