// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::Error;
use super::revocation::{RevocationDocument, RevocationEntry};
use super::IRevocationStore;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Where Google publishes the attestation certificate status list
pub const DEFAULT_STATUS_URL: &str = "https://android.googleapis.com/attestation/status";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// Which copy of the status list ended up in the store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RevocationSource {
    Network,
    Bundled,
    /// Nothing could be loaded, revocation is unknown
    Unavailable,
}

/// The store where the revocation status list is kept, indexed by
/// normalised serial number.  `None` until a list has been loaded.
#[derive(Debug)]
pub struct MemoRevocationStore {
    p: RwLock<Option<HashMap<String, RevocationEntry>>>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl Default for MemoRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

// lowercase, without leading zeros
fn normalise(serial: &str) -> String {
    let s = serial.trim().to_ascii_lowercase();
    let t = s.trim_start_matches('0');

    if t.is_empty() && !s.is_empty() {
        "0".to_string()
    } else {
        t.to_string()
    }
}

impl MemoRevocationStore {
    /// Returns a new empty, and therefore unavailable, store
    pub fn new() -> Self {
        Self {
            p: RwLock::new(None),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    /// Replace the contents of the store with the status list in the given
    /// JSON document.  On error the store is left untouched.
    pub fn load_json(&self, j: &str) -> Result<usize, Error> {
        let doc = RevocationDocument::parse(j).map_err(|e| Error::Syntax(e.to_string()))?;

        let entries: HashMap<String, RevocationEntry> = doc
            .entries
            .into_iter()
            .map(|(k, v)| (normalise(&k), v))
            .collect();

        let n = entries.len();

        *self.p.write().unwrap_or_else(PoisonError::into_inner) = Some(entries);

        debug!("loaded {n} revocation entries");

        Ok(n)
    }

    /// Download the status list from `url` and load it
    pub fn fetch(&self, url: &str) -> Result<usize, Error> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(self.connect_timeout)
            .timeout_read(self.read_timeout)
            .build();

        let body = agent
            .get(url)
            .call()
            .map_err(|e| Error::Fetch(format!("{url}: {e}")))?
            .into_string()
            .map_err(|e| Error::Fetch(format!("reading response from {url}: {e}")))?;

        self.load_json(&body)
    }

    /// Try to fetch a current status list, falling back to `bundled` when
    /// the network copy cannot be had.  Without a bundled copy the store is
    /// left as it was.  Only a malformed bundled copy is an error.
    pub fn refresh_or_fallback(
        &self,
        url: &str,
        bundled: Option<&str>,
    ) -> Result<RevocationSource, Error> {
        let e = match self.fetch(url) {
            Ok(n) => {
                info!("using {n} revocation entries from {url}");
                return Ok(RevocationSource::Network);
            }
            Err(e) => e,
        };

        match bundled {
            Some(j) => {
                warn!("revocation list fetch failed, using bundled copy: {e}");
                self.load_json(j)?;
                Ok(RevocationSource::Bundled)
            }
            None => {
                warn!("revocation list fetch failed, revocation is unknown: {e}");
                Ok(RevocationSource::Unavailable)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.p
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |m| m.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IRevocationStore for MemoRevocationStore {
    fn lookup(&self, serial: &str) -> Option<RevocationEntry> {
        self.p
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()?
            .get(&normalise(serial))
            .cloned()
    }

    fn is_available(&self) -> bool {
        self.p
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RevocationReason, RevocationStatus};
    use crate::testutil::{closed_port_url, serve_once};

    const TEST_STATUS_REVOKED: &str = include_str!("../../testdata/status-revoked.json");

    #[test]
    fn load_json_and_lookup_ok() {
        let s = MemoRevocationStore::new();
        assert!(!s.is_available());
        assert_eq!(s.lookup("f1e2d3c4b5a6978"), None);

        assert_eq!(s.load_json(TEST_STATUS_REVOKED).unwrap(), 2);
        assert!(s.is_available());

        let e = s.lookup("F1E2D3C4B5A6978").unwrap();
        assert_eq!(e.status, RevocationStatus::Revoked);
        assert_eq!(e.reason, Some(RevocationReason::KeyCompromise));

        // leading zeros do not matter
        assert!(s.lookup("0f1e2d3c4b5a6978").is_some());

        let e = s.lookup("c35747a084470c3135aeefe2b8d40cd6").unwrap();
        assert_eq!(e.status, RevocationStatus::Suspended);

        assert_eq!(s.lookup("1000"), None);
    }

    #[test]
    fn load_replaces() {
        let s = MemoRevocationStore::new();
        s.load_json(TEST_STATUS_REVOKED).unwrap();
        s.load_json(r#"{ "entries": { "1000": {} } }"#).unwrap();

        assert_eq!(s.len(), 1);
        assert_eq!(s.lookup("f1e2d3c4b5a6978"), None);
        assert!(s.lookup("1000").is_some());
    }

    #[test]
    fn bad_json_leaves_store_untouched() {
        let s = MemoRevocationStore::new();
        s.load_json(TEST_STATUS_REVOKED).unwrap();

        assert!(matches!(s.load_json("{"), Err(Error::Syntax(_))));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn fetch_ok() {
        let (url, server) = serve_once(200, TEST_STATUS_REVOKED.as_bytes().to_vec());
        let s = MemoRevocationStore::new();

        let src = s.refresh_or_fallback(&url, Some(r#"{ "entries": {} }"#)).unwrap();

        assert_eq!(src, RevocationSource::Network);
        assert_eq!(s.len(), 2);

        let req = server.join().unwrap();
        assert!(req.starts_with(b"GET / HTTP/1.1"));
    }

    #[test]
    fn fetch_fails_over_to_bundled() {
        let s = MemoRevocationStore::new()
            .with_timeouts(Duration::from_millis(500), Duration::from_millis(500));

        let src = s
            .refresh_or_fallback(&closed_port_url(), Some(TEST_STATUS_REVOKED))
            .unwrap();

        assert_eq!(src, RevocationSource::Bundled);
        assert!(s.lookup("f1e2d3c4b5a6978").is_some());
    }

    #[test]
    fn fetch_failure_without_bundled_copy() {
        let s = MemoRevocationStore::new()
            .with_timeouts(Duration::from_millis(500), Duration::from_millis(500));

        let src = s.refresh_or_fallback(&closed_port_url(), None).unwrap();

        assert_eq!(src, RevocationSource::Unavailable);
        assert!(!s.is_available());
        assert_eq!(s.lookup("f1e2d3c4b5a6978"), None);
    }

    #[test]
    fn malformed_bundled_copy() {
        let s = MemoRevocationStore::new()
            .with_timeouts(Duration::from_millis(500), Duration::from_millis(500));

        assert!(matches!(
            s.refresh_or_fallback(&closed_port_url(), Some("{")),
            Err(Error::Syntax(_))
        ));
    }

    #[test]
    fn server_error_is_a_fetch_error() {
        let (url, server) = serve_once(503, b"unavailable".to_vec());
        let s = MemoRevocationStore::new();

        assert!(matches!(s.fetch(&url), Err(Error::Fetch(_))));
        assert!(!s.is_available());

        server.join().unwrap();
    }
}
