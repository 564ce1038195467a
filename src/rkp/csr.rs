// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::common::*;
use super::device::{LegacyCertificateRequest, MacedPublicKey};
use super::errors::ProtocolError;
use ciborium::Value;

/// Build the COSE_Mac0 a version 1 or 2 certificate request is sent with:
/// HMAC-256 protected header, the COSE_Key taken out of the maced public
/// key, and the MAC the hardware computed over it.
pub fn legacy_mac0(key: &MacedPublicKey, mac: &[u8]) -> Result<Value, ProtocolError> {
    let maced = decode(&key.maced_key, "maced public key")?;
    let payload = to_bstr(
        nth(to_array(&maced, "maced public key")?, 2, "maced public key")?,
        "maced public key payload",
    )?;
    let cose_key = decode(payload, "COSE_Key")?;

    let protected = encode(&Value::Map(vec![(
        Value::Integer(cose::headers::ALG.into()),
        Value::Integer(cose::algs::HMAC_256_256.into()),
    )]))?;

    Ok(Value::Array(vec![
        Value::Bytes(protected),
        Value::Map(vec![]),
        Value::Bytes(encode(&Value::Array(vec![cose_key]))?),
        Value::Bytes(mac.to_vec()),
    ]))
}

/// `[[deviceInfo, unverifiedDeviceInfo], challenge, protectedData, mac0]`
pub fn legacy_request(
    req: &LegacyCertificateRequest,
    unverified: Value,
    challenge: &[u8],
    mac0: Value,
) -> Result<Vec<u8>, ProtocolError> {
    encode(&Value::Array(vec![
        Value::Array(vec![decode(&req.device_info, "device info")?, unverified]),
        Value::Bytes(challenge.to_vec()),
        decode(&req.protected_data, "protected data")?,
        mac0,
    ]))
}

/// Dig the DeviceInfo map out of an AuthenticatedRequest: the signed data
/// payload holds `[challenge, csrPayload]`, and the CSR payload
/// `[version, certificateType, deviceInfo, keysToSign]`.
pub fn device_info_v3(csr: &Value) -> Result<Value, ProtocolError> {
    let signed = to_array(nth(to_array(csr, "CSR")?, 3, "CSR")?, "signed data")?;
    let payload = decode(
        to_bstr(nth(signed, 2, "signed data")?, "signed data payload")?,
        "signed data payload",
    )?;
    let csr_payload = decode(
        to_bstr(
            nth(to_array(&payload, "signed data payload")?, 1, "signed data payload")?,
            "CSR payload",
        )?,
        "CSR payload",
    )?;

    let device_info = nth(to_array(&csr_payload, "CSR payload")?, 2, "CSR payload")?;

    if !device_info.is_map() {
        return Err(ProtocolError::MalformedResponse(
            "device info MUST be map".to_string(),
        ));
    }

    Ok(device_info.clone())
}

/// Append the unverified device info to an AuthenticatedRequest
pub fn v3_request(mut csr: Value, unverified: Value) -> Result<Vec<u8>, ProtocolError> {
    match &mut csr {
        Value::Array(a) => a.push(unverified),
        _ => {
            return Err(ProtocolError::MalformedResponse(
                "CSR MUST be array".to_string(),
            ))
        }
    }

    encode(&csr)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn cose_key() -> Value {
        Value::Map(vec![
            (Value::Integer(1.into()), Value::Integer(2.into())),
            (Value::Integer(3.into()), Value::Integer((-7).into())),
            (Value::Integer((-1).into()), Value::Integer(1.into())),
            (Value::Integer((-2).into()), Value::Bytes(vec![0x11; 32])),
            (Value::Integer((-3).into()), Value::Bytes(vec![0x22; 32])),
        ])
    }

    pub fn maced_key() -> MacedPublicKey {
        let maced = Value::Array(vec![
            Value::Bytes(vec![0xa1, 0x01, 0x05]),
            Value::Map(vec![]),
            Value::Bytes(encode(&cose_key()).unwrap()),
            Value::Bytes(vec![0x33; 32]),
        ]);

        MacedPublicKey {
            maced_key: encode(&maced).unwrap(),
        }
    }

    pub fn device_info() -> Value {
        Value::Map(vec![(
            Value::Text("brand".to_string()),
            Value::Text("Example".to_string()),
        )])
    }

    /// AuthenticatedRequest with the given challenge
    pub fn v3_csr(challenge: &[u8]) -> Vec<u8> {
        let csr_payload = Value::Array(vec![
            Value::Integer(3.into()),
            Value::Text("keymint".to_string()),
            device_info(),
            Value::Array(vec![cose_key()]),
        ]);
        let payload = Value::Array(vec![
            Value::Bytes(challenge.to_vec()),
            Value::Bytes(encode(&csr_payload).unwrap()),
        ]);
        let signed = Value::Array(vec![
            Value::Bytes(vec![0xa1, 0x01, 0x27]),
            Value::Map(vec![]),
            Value::Bytes(encode(&payload).unwrap()),
            Value::Bytes(vec![0x44; 64]),
        ]);

        encode(&Value::Array(vec![
            Value::Integer(1.into()),
            Value::Map(vec![]),
            Value::Array(vec![]),
            signed,
        ]))
        .unwrap()
    }
}
