// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::common::*;
use super::device::{CURVE_25519, CURVE_P256};
use super::errors::ProtocolError;
use base64::{engine::general_purpose, Engine as _};
use chrono::{SecondsFormat, Utc};
use ciborium::Value;
use serde::Serialize;
use std::collections::BTreeMap;

// Test EEK certificate chains, only good for exercising the hardware
const EEK_ED25519_BASE64: &str = concat!(
    "goRDoQEnoFgqpAEBAycgBiFYIJm57t1e5FL2hcZMYtw+YatXSH11NymtdoAy0rPL",
    "Y1jZWEAeIghLpLekyNdOAw7+uK8UTKc7b6XN3Np5xitk/pk5r3bngPpmAIUNB5gq",
    "rJFcpyUUSQY0dcqKJ3rZ41pJ6wIDhEOhASegWE6lAQECWCDQrsEVyirPc65rzMvR",
    "lh1l6LHd10oaN7lDOpfVmd+YCAM4GCAEIVggvoXnRsSjQlpA2TY6phXQLFh+Pdwz",
    "AjLS/F4ehyVfcmBYQJvPkOIuS6vRGLEOjl0gJ0uEWP78MpB+cgWDvNeCvvpkeC1U",
    "EEvAMb9r6B414vAtzmwvT/L1T6XUg62WovGHWAQ=",
);

const EEK_P256_BASE64: &str = concat!(
    "goRDoQEmoFhNpQECAyYgASFYIPcUituX9MxT79JkEcTjdR9mH6RxDGzP+glGgHSH",
    "VPKtIlggXn9b9uzk9hnM/xM3/Q+hyJPbGAZ2xF3m12p3hsMtr49YQC+XjkL7vgct",
    "lUeFR5NAsB/Um0ekxESp8qEHhxDHn8sR9L+f6Dvg5zRMFfx7w34zBfTRNDztAgRg",
    "ehXgedOK/ySEQ6EBJqBYcaYBAgJYIDVztz+gioCJsSZn6ct8daGvAmH8bmUDkTvT",
    "S30UlD5GAzgYIAEhWCDgQc8vDzQPHDMsQbDP1wwwVTXSHmpHE0su0UiWfiScaCJY",
    "IB/ORcX7YbqBIfnlBZubOQ52hoZHuB4vRfHOr9o/gGjbWECMs7p+ID4ysGjfYNEd",
    "ffCsOI5RvP9s4Wc7Snm8Vnizmdh8igfY2rW1f3H02GvfMyc0e2XRKuuGmZirOrSA",
    "qr1Q",
);

/// The endpoint encryption key chains offered by the provisioning server,
/// by curve, and the challenge the certificate request must carry.
#[serde_with::serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EekResponse {
    #[serde_as(as = "BTreeMap<_, serde_with::hex::Hex>")]
    pub chains: BTreeMap<i64, Vec<u8>>,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub challenge: Vec<u8>,
}

impl EekResponse {
    /// Decode `[[[curve, eekChain], ...], challenge]`.  Each chain is kept
    /// in its CBOR encoding.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let v = decode(buf, "EEK response")?;
        let items = to_array(&v, "EEK response")?;

        let mut chains = BTreeMap::new();

        for entry in to_array(nth(items, 0, "EEK response")?, "EEK chains")? {
            let entry = to_array(entry, "EEK chain entry")?;
            let curve = to_int(nth(entry, 0, "EEK chain entry")?, "curve")?;
            let chain = encode(nth(entry, 1, "EEK chain entry")?)?;

            chains.insert(curve, chain);
        }

        let challenge = to_bstr(nth(items, 1, "EEK response")?, "challenge")?.clone();

        Ok(Self { chains, challenge })
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let chains = self
            .chains
            .iter()
            .map(|(curve, chain)| {
                Ok(Value::Array(vec![
                    Value::Integer((*curve).into()),
                    decode(chain, "EEK chain")?,
                ]))
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;

        encode(&Value::Array(vec![
            Value::Array(chains),
            Value::Bytes(self.challenge.clone()),
        ]))
    }

    /// A response built from the test EEK chains, with the current time as
    /// challenge.  Certificate requests made with it are only of use for
    /// checking what the hardware produces.
    pub fn local() -> Self {
        let challenge = Utc::now()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .into_bytes();

        let chains = [
            (CURVE_25519, EEK_ED25519_BASE64),
            (CURVE_P256, EEK_P256_BASE64),
        ]
        .into_iter()
        .filter_map(|(c, b64)| general_purpose::STANDARD.decode(b64).ok().map(|d| (c, d)))
        .collect();

        Self { chains, challenge }
    }

    pub fn eek_chain(&self, curve: i64) -> Option<&[u8]> {
        self.chains.get(&curve).map(Vec::as_slice)
    }
}
