// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::common::*;
use super::errors::DecodeError;
use super::extensions::{Extensions, PROVISIONING_INFO_OID};
use log::warn;
use serde::Serialize;

const CERTS_ISSUED_LABEL: i128 = 1;
const MANUFACTURER_LABEL: i128 = 3;

/// Counters a remote provisioning server stamps on the attestation keys it
/// issues.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningInfo {
    pub certs_issued: Option<i64>,
    pub manufacturer: Option<String>,
}

impl ProvisioningInfo {
    /// Decode the CBOR map carried by the provisioning info extension.
    /// Unknown keys are logged and skipped.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let v = parse_cbor(buf, "provisioning-info")?;

        let mut pi = ProvisioningInfo::default();

        for (k, v) in to_map(&v, "provisioning-info")? {
            match to_int(k, "provisioning-info key")? {
                CERTS_ISSUED_LABEL => pi.certs_issued = Some(v.int("certs-issued")?),
                MANUFACTURER_LABEL => pi.manufacturer = Some(to_tstr(v, "manufacturer")?),
                x => warn!("new provisioning info: {x} = {v:?}"),
            }
        }

        Ok(pi)
    }

    /// `None` when the extension is absent or does not decode.
    pub fn from_extensions(exts: &Extensions) -> Option<Self> {
        let e = exts.get(PROVISIONING_INFO_OID)?;

        match Self::decode(&e.value) {
            Ok(pi) => Some(pi),
            Err(e) => {
                warn!("provisioning info: {e}");
                None
            }
        }
    }
}
