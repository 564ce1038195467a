// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::common::*;
use super::errors::DecodeError;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct PackageInfo {
    pub package_name: String,
    pub version: i64,
}

impl Ord for PackageInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.package_name
            .cmp(&other.package_name)
            .then(self.version.cmp(&other.version))
    }
}

impl PartialOrd for PackageInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Identity of the calling application: every package sharing the UID that
/// requested the key, plus the digests of their signing certificates.
#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct AttestationApplicationId {
    pub package_infos: Vec<PackageInfo>,
    #[serde_as(as = "Vec<serde_with::hex::Hex>")]
    pub signature_digests: Vec<Vec<u8>>,
}

impl AttestationApplicationId {
    /// Decode a DER encoded AttestationApplicationId SEQUENCE
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let obj = parse_asn1(buf, "attestation-application-id")?;
        let seq = asn1_sequence(&obj, "attestation-application-id")?;

        if seq.len() != 2 {
            return Err(DecodeError::Malformed(format!(
                "attestation-application-id: expecting 2 elements, got {}",
                seq.len()
            )));
        }

        let mut package_infos = vec![];

        for p in asn1_set(&seq[0], "package-infos")? {
            let pi = asn1_sequence(p, "package-info")?;

            if pi.len() != 2 {
                return Err(DecodeError::Malformed(format!(
                    "package-info: expecting 2 elements, got {}",
                    pi.len()
                )));
            }

            package_infos.push(PackageInfo {
                package_name: String::from_utf8_lossy(&asn1_to_bstr(&pi[0], "package-name")?)
                    .into_owned(),
                version: asn1_to_int(&pi[1], "version")?,
            });
        }

        let signature_digests = asn1_set(&seq[1], "signature-digests")?
            .iter()
            .map(|d| asn1_to_bstr(d, "signature-digest"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            package_infos,
            signature_digests,
        })
    }
}

// shorter digests sort first, equal lengths compare bytewise as signed bytes
fn cmp_digest(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (*x as i8).cmp(&(*y as i8)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

impl Ord for AttestationApplicationId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.package_infos
            .len()
            .cmp(&other.package_infos.len())
            .then_with(|| self.package_infos.cmp(&other.package_infos))
            .then_with(|| {
                self.signature_digests
                    .len()
                    .cmp(&other.signature_digests.len())
            })
            .then_with(|| {
                self.signature_digests
                    .iter()
                    .zip(other.signature_digests.iter())
                    .map(|(a, b)| cmp_digest(a, b))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
    }
}

impl PartialOrd for AttestationApplicationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
