//! Expiring signed URLs.
//!
//! A signed URL carries two extra query parameters: `expires` (unix
//! seconds) and `signature`, the hex HMAC-SHA256 of the full URL with
//! every other parameter in place. Changing the scheme, host, path or any
//! parameter invalidates it.

use std::sync::Arc;

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::form_urlencoded;

use crate::clock::{SharedClock, SystemClock};

type HmacSha256 = Hmac<Sha256>;

const EXPIRES: &str = "expires";
const SIGNATURE: &str = "signature";

/// Signs and checks URLs under one secret.
pub struct UriSigner {
    keyed: HmacSha256,
    clock: SharedClock,
}

impl UriSigner {
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, InvalidLength> {
        Self::with_clock(key, Arc::new(SystemClock))
    }

    pub fn with_clock(key: impl AsRef<[u8]>, clock: SharedClock) -> Result<Self, InvalidLength> {
        Ok(Self { keyed: HmacSha256::new_from_slice(key.as_ref())?, clock })
    }

    /// `url` with `expires` and `signature` parameters appended. Any
    /// existing values of either are replaced.
    pub fn sign(&self, url: &str, expires_at: u64) -> String {
        let (base, mut params) = split(url);
        params.retain(|(k, _)| k != EXPIRES && k != SIGNATURE);
        params.push((EXPIRES.to_owned(), expires_at.to_string()));

        let signature = hex::encode(self.mac(base, &params).finalize().into_bytes());
        params.push((SIGNATURE.to_owned(), signature));
        join(base, &params)
    }

    /// Whether `url` carries a matching signature and has not expired.
    pub fn is_valid(&self, url: &str) -> bool {
        let (base, mut params) = split(url);
        let Some(position) = params.iter().position(|(k, _)| k == SIGNATURE) else {
            return false;
        };
        let (_, signature) = params.remove(position);

        let expires = params.iter()
            .find(|(k, _)| k == EXPIRES)
            .and_then(|(_, v)| v.parse::<u64>().ok())
            .unwrap_or(0);
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };

        expires > 0
            && self.mac(base, &params).verify_slice(&signature).is_ok()
            && self.clock.now() < expires
    }

    fn mac(&self, base: &str, params: &[(String, String)]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(join(base, params).as_bytes());
        mac
    }
}

/// Everything before the query, and the decoded query pairs in order.
fn split(url: &str) -> (&str, Vec<(String, String)>) {
    let url = url.split_once('#').map_or(url, |(before, _)| before);
    match url.split_once('?') {
        Some((base, query)) => (base, form_urlencoded::parse(query.as_bytes()).into_owned().collect()),
        None => (url, Vec::new()),
    }
}

fn join(base: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return base.to_owned();
    }
    let query = form_urlencoded::Serializer::new(String::new()).extend_pairs(params).finish();
    format!("{base}?{query}")
}
