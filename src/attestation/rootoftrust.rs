// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::common::*;
use super::errors::DecodeError;
use serde::Serialize;
use x509_parser::der_parser::ber::BerObject;

/// Outcome of verified boot as reported by the bootloader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VerifiedBootState {
    Verified,
    SelfSigned,
    Unverified,
    Failed,
}

impl TryFrom<i64> for VerifiedBootState {
    type Error = DecodeError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(VerifiedBootState::Verified),
            1 => Ok(VerifiedBootState::SelfSigned),
            2 => Ok(VerifiedBootState::Unverified),
            3 => Ok(VerifiedBootState::Failed),
            x => Err(DecodeError::TypeMismatch(format!(
                "unknown verified boot state {x}"
            ))),
        }
    }
}

const BOOT_STATE_VECTOR_LEN: usize = 5;
const DEBUG_PERMANENT_DISABLE: usize = 4;

/// Resolve the EAT boot state vector `(verified-or-self-signed, .., ..,
/// .., debug-permanently-disabled)` into a single state.
pub fn eat_boot_state(v: &[bool], official_build: bool) -> Result<VerifiedBootState, DecodeError> {
    if v.len() != BOOT_STATE_VECTOR_LEN {
        return Err(DecodeError::Malformed(format!(
            "boot state: expecting {BOOT_STATE_VECTOR_LEN} entries, got {}",
            v.len()
        )));
    }

    if v[DEBUG_PERMANENT_DISABLE] {
        return Err(DecodeError::InvariantViolation(
            "boot state: debug-permanent-disable is set".to_string(),
        ));
    }

    let verified_or_self_signed = v[0];

    if verified_or_self_signed != v[1]
        && verified_or_self_signed != v[2]
        && verified_or_self_signed != v[3]
    {
        return Err(DecodeError::InvariantViolation(format!(
            "boot state: inconsistent vector {v:?}"
        )));
    }

    if official_build {
        if !verified_or_self_signed {
            return Err(DecodeError::InvariantViolation(
                "boot state: official build is not verified".to_string(),
            ));
        }
        return Ok(VerifiedBootState::Verified);
    }

    if verified_or_self_signed {
        Ok(VerifiedBootState::SelfSigned)
    } else {
        Ok(VerifiedBootState::Unverified)
    }
}

#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RootOfTrust {
    #[serde_as(as = "serde_with::hex::Hex")]
    pub verified_boot_key: Vec<u8>,
    pub device_locked: bool,
    pub verified_boot_state: VerifiedBootState,
    #[serde_as(as = "Option<serde_with::hex::Hex>")]
    pub verified_boot_hash: Option<Vec<u8>>,
}

impl RootOfTrust {
    /// Decode a DER encoded RootOfTrust SEQUENCE
    pub fn decode(buf: &[u8]) -> Result<RootOfTrust, DecodeError> {
        let obj = parse_asn1(buf, "root-of-trust")?;

        Self::from_asn1(&obj)
    }

    pub fn from_asn1(obj: &BerObject) -> Result<RootOfTrust, DecodeError> {
        let seq = asn1_sequence(obj, "root-of-trust")?;

        if !matches!(seq.len(), 3 | 4) {
            return Err(DecodeError::Malformed(format!(
                "root-of-trust: expecting 3 or 4 elements, got {}",
                seq.len()
            )));
        }

        let state = asn1_to_int(&seq[2], "verified-boot-state")?;

        let verified_boot_hash = match seq.get(3) {
            Some(h) => Some(asn1_to_bstr(h, "verified-boot-hash")?),
            None => None,
        };

        Ok(RootOfTrust {
            verified_boot_key: asn1_to_bstr(&seq[0], "verified-boot-key")?,
            device_locked: asn1_to_bool(&seq[1], "device-locked")?,
            verified_boot_state: VerifiedBootState::try_from(state)?,
            verified_boot_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn debug_permanent_disable_is_fatal() {
        for official in [false, true] {
            let r = eat_boot_state(&[true, false, false, false, true], official);
            assert!(matches!(r, Err(DecodeError::InvariantViolation(_))));
        }
    }

    #[test]
    fn official_build_verified() {
        let r = eat_boot_state(&[true, true, true, true, false], true);
        assert_eq!(r, Ok(VerifiedBootState::Verified));
    }

    #[test]
    fn official_build_must_verify() {
        let r = eat_boot_state(&[false, false, true, true, false], true);
        assert!(matches!(r, Err(DecodeError::InvariantViolation(_))));
    }

    #[test]
    fn unofficial_builds() {
        assert_eq!(
            eat_boot_state(&[true, true, false, false, false], false),
            Ok(VerifiedBootState::SelfSigned)
        );
        assert_eq!(
            eat_boot_state(&[false, false, true, true, false], false),
            Ok(VerifiedBootState::Unverified)
        );
    }

    #[test]
    fn inconsistent_vector() {
        let r = eat_boot_state(&[true, false, false, false, false], false);
        assert!(matches!(r, Err(DecodeError::InvariantViolation(_))));

        let r = eat_boot_state(&[true, false, false, false], false);
        assert!(matches!(r, Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn three_element_sequence() {
        // { OCTET STRING 'aabb', BOOLEAN false, ENUMERATED 2 }
        let buf = hex!("300a0402aabb0101000a0102");
        let rot = RootOfTrust::decode(&buf).unwrap();

        assert_eq!(rot.verified_boot_key, hex!("aabb"));
        assert!(!rot.device_locked);
        assert_eq!(rot.verified_boot_state, VerifiedBootState::Unverified);
        assert_eq!(rot.verified_boot_hash, None);
    }

    #[test]
    fn bad_state_and_length() {
        // state 7
        let buf = hex!("300a0402aabb0101000a0107");
        assert!(RootOfTrust::decode(&buf).is_err());

        // two elements only
        let buf = hex!("30070402aabb010100");
        assert!(matches!(
            RootOfTrust::decode(&buf),
            Err(DecodeError::Malformed(_))
        ));
    }
}
