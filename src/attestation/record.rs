// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::authorization::AuthorizationList;
use super::common::*;
use super::eat::EatRecord;
use super::errors::DecodeError;
use super::extensions::*;
use super::rootoftrust::RootOfTrust;
use super::vendor::VendorRecord;
use serde::Serialize;
use std::collections::BTreeSet;
use x509_parser::der_parser::ber::BerObject;

pub const KM_PURPOSE_ATTEST_KEY: i64 = 7;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SecurityLevel {
    #[default]
    Software,
    TrustedEnvironment,
    StrongBox,
}

impl SecurityLevel {
    /// Map an EAT security level (unrestricted, secure-restricted, hardware).
    pub fn from_eat(v: i64) -> Result<Self, DecodeError> {
        match v {
            1 => Ok(SecurityLevel::Software),
            3 => Ok(SecurityLevel::TrustedEnvironment),
            4 => Ok(SecurityLevel::StrongBox),
            x => Err(DecodeError::TypeMismatch(format!(
                "unknown EAT security level {x}"
            ))),
        }
    }
}

impl TryFrom<i64> for SecurityLevel {
    type Error = DecodeError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(SecurityLevel::Software),
            1 => Ok(SecurityLevel::TrustedEnvironment),
            2 => Ok(SecurityLevel::StrongBox),
            x => Err(DecodeError::TypeMismatch(format!(
                "unknown security level {x}"
            ))),
        }
    }
}

const KEY_DESCRIPTION_LEN: usize = 8;

/// The KeyDescription SEQUENCE carried by the standard attestation extension.
#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyDescription {
    pub attestation_version: i64,
    pub attestation_security_level: SecurityLevel,
    pub keymint_version: i64,
    pub keymint_security_level: SecurityLevel,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub challenge: Vec<u8>,
    #[serde_as(as = "Option<serde_with::hex::Hex>")]
    pub unique_id: Option<Vec<u8>>,
    pub software_enforced: AuthorizationList,
    pub hardware_enforced: AuthorizationList,
}

impl KeyDescription {
    /// Decode the DER encoded contents of the standard attestation extension
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let obj = parse_asn1(buf, "key-description")?;

        Self::from_asn1(&obj)
    }

    fn from_asn1(obj: &BerObject) -> Result<Self, DecodeError> {
        let seq = asn1_sequence(obj, "key-description")?;

        if seq.len() != KEY_DESCRIPTION_LEN {
            return Err(DecodeError::Malformed(format!(
                "key-description: expecting {KEY_DESCRIPTION_LEN} elements, got {}",
                seq.len()
            )));
        }

        let unique_id = asn1_to_bstr(&seq[5], "unique-id")?;

        Ok(Self {
            attestation_version: asn1_to_int(&seq[0], "attestation-version")?,
            attestation_security_level: SecurityLevel::try_from(asn1_to_int(
                &seq[1],
                "attestation-security-level",
            )?)?,
            keymint_version: asn1_to_int(&seq[2], "keymint-version")?,
            keymint_security_level: SecurityLevel::try_from(asn1_to_int(
                &seq[3],
                "keymint-security-level",
            )?)?,
            challenge: asn1_to_bstr(&seq[4], "attestation-challenge")?,
            unique_id: if unique_id.is_empty() {
                None
            } else {
                Some(unique_id)
            },
            software_enforced: AuthorizationList::from_asn1(&seq[6])?,
            hardware_enforced: AuthorizationList::from_asn1(&seq[7])?,
        })
    }
}

/// A decoded attestation, in whichever of the three formats the certificate
/// carried it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum AttestationRecord {
    Standard(KeyDescription),
    Eat(EatRecord),
    Vendor(VendorRecord),
}

impl AttestationRecord {
    /// Decode the attestation carried by a DER encoded certificate
    pub fn from_certificate(der: &[u8]) -> Result<Self, DecodeError> {
        Self::from_extensions(&Extensions::from_certificate(der)?)
    }

    pub fn from_extensions(exts: &Extensions) -> Result<Self, DecodeError> {
        let standard = exts.get(KEY_ATTESTATION_OID);
        let eat = exts.get(EAT_OID);

        match (standard, eat) {
            (None, None) => Err(DecodeError::NoAttestationExtension),
            (Some(_), Some(_)) => Err(DecodeError::MultipleAttestationExtensions),
            (None, Some(e)) => Ok(AttestationRecord::Eat(EatRecord::decode(&e.value)?)),
            (Some(s), None) => match exts.get(KNOX_OID) {
                Some(k) => Ok(AttestationRecord::Vendor(VendorRecord::decode(
                    &s.value, &k.value,
                )?)),
                None => Ok(AttestationRecord::Standard(KeyDescription::decode(
                    &s.value,
                )?)),
            },
        }
    }

    pub fn attestation_version(&self) -> Option<i64> {
        match self {
            AttestationRecord::Standard(kd) => Some(kd.attestation_version),
            AttestationRecord::Vendor(v) => Some(v.key_description.attestation_version),
            AttestationRecord::Eat(e) => e.attestation_version,
        }
    }

    /// `None` when an EAT record does not allow the level to be determined.
    pub fn attestation_security_level(&self) -> Option<SecurityLevel> {
        match self {
            AttestationRecord::Standard(kd) => Some(kd.attestation_security_level),
            AttestationRecord::Vendor(v) => Some(v.key_description.attestation_security_level),
            AttestationRecord::Eat(e) => e.attestation_security_level(),
        }
    }

    pub fn keymint_version(&self) -> Option<i64> {
        match self {
            AttestationRecord::Standard(kd) => Some(kd.keymint_version),
            AttestationRecord::Vendor(v) => Some(v.key_description.keymint_version),
            AttestationRecord::Eat(e) => e.keymint_version,
        }
    }

    pub fn keymint_security_level(&self) -> SecurityLevel {
        match self {
            AttestationRecord::Standard(kd) => kd.keymint_security_level,
            AttestationRecord::Vendor(v) => v.key_description.keymint_security_level,
            AttestationRecord::Eat(e) => e.keymint_security_level,
        }
    }

    pub fn challenge(&self) -> &[u8] {
        match self {
            AttestationRecord::Standard(kd) => &kd.challenge,
            AttestationRecord::Vendor(v) => &v.key_description.challenge,
            AttestationRecord::Eat(e) => &e.challenge,
        }
    }

    pub fn unique_id(&self) -> Option<&[u8]> {
        match self {
            AttestationRecord::Standard(kd) => kd.unique_id.as_deref(),
            AttestationRecord::Vendor(v) => v.key_description.unique_id.as_deref(),
            AttestationRecord::Eat(e) => e.unique_id.as_deref(),
        }
    }

    pub fn software_enforced(&self) -> &AuthorizationList {
        match self {
            AttestationRecord::Standard(kd) => &kd.software_enforced,
            AttestationRecord::Vendor(v) => &v.key_description.software_enforced,
            AttestationRecord::Eat(e) => &e.software_enforced,
        }
    }

    pub fn hardware_enforced(&self) -> &AuthorizationList {
        match self {
            AttestationRecord::Standard(kd) => &kd.hardware_enforced,
            AttestationRecord::Vendor(v) => &v.key_description.hardware_enforced,
            AttestationRecord::Eat(e) => &e.hardware_enforced,
        }
    }

    pub fn root_of_trust(&self) -> Option<&RootOfTrust> {
        match self {
            AttestationRecord::Standard(kd) => kd.hardware_enforced.root_of_trust.as_ref(),
            AttestationRecord::Vendor(v) => {
                v.key_description.hardware_enforced.root_of_trust.as_ref()
            }
            AttestationRecord::Eat(e) => e.root_of_trust.as_ref(),
        }
    }

    /// Purposes of the attested key, as enforced by hardware if it says
    /// anything about them, otherwise by software.
    pub fn purposes(&self) -> Option<&BTreeSet<i64>> {
        self.hardware_enforced()
            .purposes
            .as_ref()
            .or(self.software_enforced().purposes.as_ref())
    }

    /// Whether the attested key may sign attestations of other keys.
    pub fn can_attest_keys(&self) -> bool {
        self.purposes()
            .map(|p| p.contains(&KM_PURPOSE_ATTEST_KEY))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CHAIN_STANDARD: &[u8] = include_bytes!("../../testdata/chain-standard.der");
    const TEST_CHAIN_EAT: &[u8] = include_bytes!("../../testdata/chain-eat.der");
    const TEST_CHAIN_KNOX: &[u8] = include_bytes!("../../testdata/chain-knox.der");
    const TEST_LEAF_BOTH: &[u8] = include_bytes!("../../testdata/leaf-both.der");

    fn certs(buf: &[u8]) -> Vec<&[u8]> {
        let mut out = vec![];
        let mut rest = buf;
        while !rest.is_empty() {
            let (rem, _) = x509_parser::parse_x509_certificate(rest).unwrap();
            out.push(&rest[..rest.len() - rem.len()]);
            rest = rem;
        }
        out
    }

    fn standard_extension(der: &[u8]) -> Vec<u8> {
        Extensions::from_certificate(der)
            .unwrap()
            .get(KEY_ATTESTATION_OID)
            .unwrap()
            .value
            .clone()
    }

    #[test]
    fn standard_record() {
        let chain = certs(TEST_CHAIN_STANDARD);
        let r = AttestationRecord::from_certificate(chain[0]).unwrap();

        let AttestationRecord::Standard(kd) = &r else {
            panic!("expecting a standard record, got {r:?}");
        };

        assert_eq!(kd.attestation_version, 200);
        assert_eq!(kd.attestation_security_level, SecurityLevel::TrustedEnvironment);
        assert_eq!(r.keymint_version(), Some(200));
        assert_eq!(r.challenge(), b"test-challenge");
        assert_eq!(r.unique_id(), None);

        let hw = r.hardware_enforced();
        assert_eq!(hw.algorithm, Some(3));
        assert_eq!(hw.key_size, Some(256));
        assert_eq!(hw.ec_curve, Some(1));
        assert_eq!(hw.digests, Some([4].into_iter().collect()));
        assert_eq!(hw.os_patch_level, Some(202401));
        assert_eq!(hw.boot_patch_level, Some(20240105));
        assert!(hw.no_auth_required);

        let sw = r.software_enforced();
        assert_eq!(
            sw.creation_date_time.map(|d| d.timestamp_millis()),
            Some(1704067200000)
        );
        let app = sw.attestation_application_id.as_ref().unwrap();
        assert_eq!(app.package_infos[0].package_name, "com.example.app");
        assert_eq!(app.package_infos[0].version, 42);
        assert_eq!(app.signature_digests, vec![vec![0x33; 32]]);

        let rot = r.root_of_trust().unwrap();
        assert_eq!(rot.verified_boot_key, vec![0x11; 32]);
        assert!(rot.device_locked);
        assert_eq!(rot.verified_boot_hash, Some(vec![0x22; 32]));

        assert!(!r.can_attest_keys());
    }

    #[test]
    fn different_challenges_decode_differently() {
        let chain = certs(TEST_CHAIN_STANDARD);
        let ext = standard_extension(chain[0]);

        // same length, so only the challenge octets differ
        let pos = ext
            .windows(14)
            .position(|w| w == b"test-challenge")
            .unwrap();
        let mut other = ext.clone();
        other[pos] = b'b';

        let a = KeyDescription::decode(&ext).unwrap();
        let b = KeyDescription::decode(&other).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.hardware_enforced, b.hardware_enforced);
    }

    #[test]
    fn truncated_key_description() {
        let chain = certs(TEST_CHAIN_STANDARD);
        let ext = standard_extension(chain[0]);

        assert!(matches!(
            KeyDescription::decode(&ext[..ext.len() - 3]),
            Err(DecodeError::Syntax(_))
        ));
    }

    #[test]
    fn eat_record() {
        let chain = certs(TEST_CHAIN_EAT);
        let r = AttestationRecord::from_certificate(chain[0]).unwrap();

        assert!(matches!(r, AttestationRecord::Eat(_)));
        assert_eq!(r.challenge(), b"eat-challenge");
        assert_eq!(r.unique_id(), Some(&b"uid"[..]));
        assert_eq!(r.attestation_version(), Some(300));
        assert_eq!(
            r.attestation_security_level(),
            Some(SecurityLevel::TrustedEnvironment)
        );
        assert_eq!(
            r.hardware_enforced().purposes,
            Some([2, 3].into_iter().collect())
        );
        assert!(r.software_enforced().attestation_application_id.is_some());
        assert_eq!(
            r.root_of_trust().map(|r| r.verified_boot_state),
            Some(crate::attestation::VerifiedBootState::Verified)
        );
    }

    #[test]
    fn vendor_record() {
        let chain = certs(TEST_CHAIN_KNOX);
        let r = AttestationRecord::from_certificate(chain[0]).unwrap();

        let AttestationRecord::Vendor(v) = &r else {
            panic!("expecting a vendor record, got {r:?}");
        };

        assert_eq!(v.challenge.as_deref(), Some("knox-challenge"));
        assert_eq!(r.challenge(), b"test-challenge");
        assert!(r.root_of_trust().is_some());
    }

    #[test]
    fn no_attestation_extension() {
        let chain = certs(TEST_CHAIN_STANDARD);

        // the intermediate
        assert_eq!(
            AttestationRecord::from_certificate(chain[1]),
            Err(DecodeError::NoAttestationExtension)
        );
    }

    #[test]
    fn multiple_attestation_extensions() {
        assert_eq!(
            AttestationRecord::from_certificate(TEST_LEAF_BOTH),
            Err(DecodeError::MultipleAttestationExtensions)
        );
    }

    #[test]
    fn security_levels() {
        assert_eq!(SecurityLevel::try_from(2), Ok(SecurityLevel::StrongBox));
        assert!(SecurityLevel::try_from(3).is_err());
        assert_eq!(SecurityLevel::from_eat(4), Ok(SecurityLevel::StrongBox));
        assert!(SecurityLevel::from_eat(2).is_err());
    }
}
