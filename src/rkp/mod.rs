// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

//! Remote key provisioning client.
//!
//! A provisioning cycle fetches the server's endpoint encryption key (EEK)
//! chains and challenge, has the device hardware generate an attestation key
//! and a certificate request for it, and sends the request back to be signed.
//! All calls are blocking, with a 2 s connect and 20 s read timeout by
//! default, and are not retried.

pub use self::client::{CertificateRequest, Provisioned, RkpClient, RkpConfig, DEFAULT_URL};
pub use self::device::{
    HardwareInfo, LegacyCertificateRequest, MacedPublicKey, RemotelyProvisionedComponent,
    CURVE_25519, CURVE_NONE, CURVE_P256,
};
pub use self::eek::EekResponse;
pub use self::errors::ProtocolError;

mod client;
mod common;
mod csr;
mod device;
mod eek;
mod errors;
