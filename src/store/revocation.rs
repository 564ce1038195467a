// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationStatus {
    #[default]
    Revoked,
    Suspended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    Superseded,
    SoftwareFlaw,
    #[serde(other)]
    Other,
}

/// Status of one revoked or suspended certificate.  Fields other than
/// `status` and `reason` are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RevocationEntry {
    #[serde(default)]
    pub status: RevocationStatus,
    #[serde(default)]
    pub reason: Option<RevocationReason>,
}

/// The attestation status document: revoked serial numbers, in lowercase
/// hex, mapped to their status.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RevocationDocument {
    pub(crate) entries: HashMap<String, RevocationEntry>,
}

impl RevocationDocument {
    pub(crate) fn parse(j: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(j)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_entries() {
        let j = r#"{
            "entries": {
                "a1": { "status": "SUSPENDED", "reason": "NEW_REASON", "expires": "2030-01-01" },
                "b2": { "status": "REVOKED" },
                "c3": {}
            }
        }"#;

        let d = RevocationDocument::parse(j).unwrap();

        assert_eq!(
            d.entries["a1"],
            RevocationEntry {
                status: RevocationStatus::Suspended,
                reason: Some(RevocationReason::Other),
            }
        );
        assert_eq!(d.entries["b2"].reason, None);
        assert_eq!(d.entries["c3"].status, RevocationStatus::Revoked);
    }

    #[test]
    fn entries_are_mandatory() {
        assert!(RevocationDocument::parse(r#"{ "revoked": {} }"#).is_err());
        assert!(RevocationDocument::parse(r#"{ "entries": [] }"#).is_err());
    }
}
