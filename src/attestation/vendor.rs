// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::common::*;
use super::errors::DecodeError;
use super::record::KeyDescription;
use serde::Serialize;
use x509_parser::der_parser::ber::BerObject;

const KNOX_CHALLENGE: u32 = 0;
const KNOX_ID_ATTEST: u32 = 4;
const KNOX_INTEGRITY: u32 = 5;
const KNOX_RECORD_HASH: u32 = 6;

const INTEGRITY_TRUST_BOOT: u32 = 0;
const INTEGRITY_WARRANTY: u32 = 1;
const INTEGRITY_ICD: u32 = 2;
const INTEGRITY_KERNEL: u32 = 3;
const INTEGRITY_SYSTEM: u32 = 4;
const INTEGRITY_AUTH_RESULT: u32 = 5;

const AUTH_CALLER_RESULT: u32 = 0;
const AUTH_CALLING_PACKAGE: u32 = 1;
const AUTH_CALLING_PACKAGE_SIGS: u32 = 2;
const AUTH_CALLING_PACKAGE_RESULT: u32 = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Status {
    Normal,
    Abnormal,
    #[default]
    NotSupported,
    Other(i64),
}

impl From<i64> for Status {
    fn from(v: i64) -> Self {
        match v {
            0 => Status::Normal,
            1 => Status::Abnormal,
            2 => Status::NotSupported,
            x => Status::Other(x),
        }
    }
}

/// Caller authentication performed by the vendor's process authenticator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AuthResult {
    pub caller_auth_result: Status,
    pub calling_package: Option<String>,
    pub calling_package_signatures: Option<String>,
    pub calling_package_auth_result: Status,
}

impl AuthResult {
    // an all-default result means no authentication was performed
    fn from_asn1(obj: &BerObject) -> Result<Option<Self>, DecodeError> {
        let mut ar = AuthResult::default();

        for (tag, v) in tagged_entries(obj, "auth-result")? {
            match tag {
                AUTH_CALLER_RESULT => {
                    ar.caller_auth_result = asn1_to_int(&v, "caller-auth-result")?.into()
                }
                AUTH_CALLING_PACKAGE => {
                    ar.calling_package = Some(asn1_to_string(&v, "calling-package")?)
                }
                AUTH_CALLING_PACKAGE_SIGS => {
                    ar.calling_package_signatures =
                        Some(asn1_to_string(&v, "calling-package-signatures")?)
                }
                AUTH_CALLING_PACKAGE_RESULT => {
                    ar.calling_package_auth_result =
                        asn1_to_int(&v, "calling-package-auth-result")?.into()
                }
                x => return Err(DecodeError::UnknownTag(format!("{x} in auth-result"))),
            }
        }

        if ar == AuthResult::default() {
            Ok(None)
        } else {
            Ok(Some(ar))
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityStatus {
    pub trust_boot: Status,
    pub warranty: Status,
    pub icd: Status,
    pub kernel: Status,
    pub system: Status,
    pub auth_result: Option<AuthResult>,
}

impl IntegrityStatus {
    fn from_asn1(obj: &BerObject) -> Result<Self, DecodeError> {
        let mut is = IntegrityStatus::default();

        for (tag, v) in tagged_entries(obj, "integrity-status")? {
            match tag {
                INTEGRITY_TRUST_BOOT => is.trust_boot = asn1_to_int(&v, "trust-boot")?.into(),
                INTEGRITY_WARRANTY => is.warranty = asn1_to_int(&v, "warranty")?.into(),
                INTEGRITY_ICD => is.icd = asn1_to_int(&v, "icd")?.into(),
                INTEGRITY_KERNEL => is.kernel = asn1_to_int(&v, "kernel")?.into(),
                INTEGRITY_SYSTEM => is.system = asn1_to_int(&v, "system")?.into(),
                INTEGRITY_AUTH_RESULT => is.auth_result = AuthResult::from_asn1(&v)?,
                x => return Err(DecodeError::UnknownTag(format!("{x} in integrity-status"))),
            }
        }

        Ok(is)
    }
}

/// Samsung Knox attestation: the standard key description plus the vendor
/// extension's own challenge, ID attestation and integrity status.
#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VendorRecord {
    pub key_description: KeyDescription,
    pub challenge: Option<String>,
    pub id_attest: Option<String>,
    pub integrity: Option<IntegrityStatus>,
    #[serde_as(as = "Option<serde_with::hex::Hex>")]
    pub record_hash: Option<Vec<u8>>,
}

impl VendorRecord {
    /// Decode the standard extension `standard` together with the vendor
    /// extension `knox` that extends it
    pub fn decode(standard: &[u8], knox: &[u8]) -> Result<Self, DecodeError> {
        let mut r = VendorRecord {
            key_description: KeyDescription::decode(standard)?,
            challenge: None,
            id_attest: None,
            integrity: None,
            record_hash: None,
        };

        let obj = parse_asn1(knox, "knox")?;

        for (tag, v) in tagged_entries(&obj, "knox")? {
            match tag {
                KNOX_CHALLENGE => r.challenge = Some(asn1_to_string(&v, "knox-challenge")?),
                KNOX_ID_ATTEST => r.id_attest = Some(asn1_to_string(&v, "id-attest")?),
                KNOX_INTEGRITY => r.integrity = Some(IntegrityStatus::from_asn1(&v)?),
                KNOX_RECORD_HASH => r.record_hash = Some(asn1_to_bstr(&v, "record-hash")?),
                x => return Err(DecodeError::UnknownTag(format!("{x} in knox"))),
            }
        }

        Ok(r)
    }
}

// (tag, unwrapped value) for each EXPLICIT tagged element of a SEQUENCE
fn tagged_entries<'a>(
    obj: &BerObject<'a>,
    n: &str,
) -> Result<Vec<(u32, BerObject<'a>)>, DecodeError> {
    asn1_sequence(obj, n)?
        .iter()
        .map(|e| {
            let tag = asn1_context_tag(e).ok_or_else(|| {
                DecodeError::TypeMismatch(format!(
                    "{n}: expecting tagged object, got {:?}",
                    e.header.tag()
                ))
            })?;
            Ok((tag, asn1_explicit(e, n)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::extensions::*;
    use hex_literal::hex;

    const TEST_CHAIN_KNOX: &[u8] = include_bytes!("../../testdata/chain-knox.der");

    fn extension(oid: &str) -> Vec<u8> {
        let (rem, _) = x509_parser::parse_x509_certificate(TEST_CHAIN_KNOX).unwrap();
        let leaf = &TEST_CHAIN_KNOX[..TEST_CHAIN_KNOX.len() - rem.len()];

        Extensions::from_certificate(leaf)
            .unwrap()
            .get(oid)
            .unwrap()
            .value
            .clone()
    }

    #[test]
    fn decode_ok() {
        let r =
            VendorRecord::decode(&extension(KEY_ATTESTATION_OID), &extension(KNOX_OID)).unwrap();

        assert_eq!(r.challenge.as_deref(), Some("knox-challenge"));
        assert_eq!(r.id_attest.as_deref(), Some("id-attest"));
        assert_eq!(r.record_hash, Some(vec![0x44; 32]));
        assert_eq!(r.key_description.challenge, b"test-challenge");

        let is = r.integrity.unwrap();
        assert_eq!(is.trust_boot, Status::Normal);
        assert_eq!(is.icd, Status::Abnormal);

        let ar = is.auth_result.unwrap();
        assert_eq!(ar.calling_package.as_deref(), Some("com.samsung.android.app"));
        assert_eq!(ar.calling_package_signatures, None);
        assert_eq!(ar.calling_package_auth_result, Status::Normal);
    }

    #[test]
    fn default_auth_result_is_absent() {
        // [5] { [5] { [0] 2 } }
        let buf = hex!("300da50b3009a5073005a003020102");
        let obj = parse_asn1(&buf, "integrity").unwrap();
        let is = tagged_entries(&obj, "integrity").unwrap();

        let is = IntegrityStatus::from_asn1(&is[0].1).unwrap();
        assert_eq!(is.auth_result, None);
        assert_eq!(is.system, Status::NotSupported);
    }

    #[test]
    fn unknown_tag() {
        // [7] INTEGER 1
        let knox = hex!("3005a703020101");
        let r = VendorRecord::decode(&extension(KEY_ATTESTATION_OID), &knox);

        assert!(matches!(r, Err(DecodeError::UnknownTag(_))));
    }

    #[test]
    fn untagged_entry() {
        let knox = hex!("3003020101");
        let r = VendorRecord::decode(&extension(KEY_ATTESTATION_OID), &knox);

        assert!(matches!(r, Err(DecodeError::TypeMismatch(_))));
    }
}
