// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::DecodeError;
use serde::Serialize;

pub const KEY_ATTESTATION_OID: &str = "1.3.6.1.4.1.11129.2.1.17";
pub const EAT_OID: &str = "1.3.6.1.4.1.11129.2.1.25";
pub const KNOX_OID: &str = "1.3.6.1.4.1.236.11.3.23.7";
pub const PROVISIONING_INFO_OID: &str = "1.3.6.1.4.1.11129.2.1.30";
pub const KEY_USAGE_OID: &str = "2.5.29.15";

/// A certificate extension, with `value` holding the contents of extnValue.
#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Extension {
    pub oid: String,
    pub critical: bool,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub value: Vec<u8>,
}

/// The extensions of one X.509 certificate, in certificate order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extensions(Vec<Extension>);

impl Extensions {
    pub fn new(exts: Vec<Extension>) -> Self {
        Self(exts)
    }

    /// Extract the extensions from a DER encoded certificate
    pub fn from_certificate(der: &[u8]) -> Result<Self, DecodeError> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| DecodeError::Syntax(format!("certificate: {e}")))?;

        let exts = cert
            .extensions()
            .iter()
            .map(|e| Extension {
                oid: e.oid.to_id_string(),
                critical: e.critical,
                value: e.value.to_vec(),
            })
            .collect();

        Ok(Self(exts))
    }

    pub fn get(&self, oid: &str) -> Option<&Extension> {
        self.0.iter().find(|e| e.oid == oid)
    }

    pub fn contains(&self, oid: &str) -> bool {
        self.get(oid).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.0.iter()
    }

    /// Critical extensions other than key usage, and non-critical ones other
    /// than the attestation extensions.
    pub fn unexpected_oids(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|e| {
                if e.critical {
                    e.oid != KEY_USAGE_OID
                } else {
                    e.oid != KEY_ATTESTATION_OID && e.oid != EAT_OID
                }
            })
            .map(|e| e.oid.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CHAIN_KNOX: &[u8] = include_bytes!("../../testdata/chain-knox.der");

    // first certificate of a DER concatenation
    fn leaf(buf: &[u8]) -> &[u8] {
        let (rem, _) = x509_parser::parse_x509_certificate(buf).unwrap();
        &buf[..buf.len() - rem.len()]
    }

    #[test]
    fn extensions_of_leaf() {
        let exts = Extensions::from_certificate(leaf(TEST_CHAIN_KNOX)).unwrap();

        assert!(exts.contains(KEY_ATTESTATION_OID));
        assert!(exts.contains(KNOX_OID));
        assert!(!exts.contains(EAT_OID));
        assert!(exts.get(KEY_USAGE_OID).unwrap().critical);

        // the vendor extension is neither critical nor a core attestation one
        assert_eq!(exts.unexpected_oids(), vec![KNOX_OID]);
    }

    #[test]
    fn garbage_certificate() {
        assert!(matches!(
            Extensions::from_certificate(&[0x30, 0x03, 0x02, 0x01, 0x01]),
            Err(DecodeError::Syntax(_))
        ));
    }
}
