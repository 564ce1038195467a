// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::ProtocolError;
use serde::Serialize;

pub const CURVE_NONE: i64 = 0;
pub const CURVE_P256: i64 = 1;
pub const CURVE_25519: i64 = 2;

/// What the provisioning hardware reports about itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HardwareInfo {
    pub version_number: i32,
    pub rpc_author_name: String,
    /// `CURVE_NONE` from version 3 on, the EEK is not used any more
    pub supported_eek_curve: i64,
    pub unique_id: Option<String>,
    pub supported_num_keys_in_csr: i32,
}

/// A COSE_Mac0 over the COSE_Key of a freshly generated attestation key.
#[serde_with::serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MacedPublicKey {
    #[serde_as(as = "serde_with::hex::Hex")]
    pub maced_key: Vec<u8>,
}

/// Output of the version 1 and 2 certificate request primitive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LegacyCertificateRequest {
    /// CBOR DeviceInfo map
    pub device_info: Vec<u8>,
    /// CBOR ProtectedData, encrypted to the EEK
    pub protected_data: Vec<u8>,
    /// MAC over the keys to sign
    pub keys_to_sign_mac: Vec<u8>,
}

/// The device side of remote key provisioning: the hardware that generates
/// attestation keys and signs certificate requests for them.
pub trait RemotelyProvisionedComponent {
    fn hardware_info(&self) -> Result<HardwareInfo, ProtocolError>;

    fn generate_ecdsa_p256_key_pair(&self, test_mode: bool)
        -> Result<MacedPublicKey, ProtocolError>;

    /// Versions 1 and 2
    fn generate_certificate_request(
        &self,
        test_mode: bool,
        keys: &[MacedPublicKey],
        eek_chain: &[u8],
        challenge: &[u8],
    ) -> Result<LegacyCertificateRequest, ProtocolError>;

    /// Version 3 on.  Returns the encoded AuthenticatedRequest.
    fn generate_certificate_request_v2(
        &self,
        keys: &[MacedPublicKey],
        challenge: &[u8],
    ) -> Result<Vec<u8>, ProtocolError>;
}
