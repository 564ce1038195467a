// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

//! Android key attestation decoding and verification.
//!
//! Keys generated by an Android keystore come with an X.509 certificate
//! chain whose leaf carries an attestation of the key's properties and of
//! the device state it was generated in.  This crate turns such chains into
//! a structured, checked form.
//!
//! The API allows:
//! * Decoding the attestation extension of a certificate, in its ASN.1,
//!   CBOR (EAT) and Samsung Knox flavours
//! * Evaluating a certificate chain: signatures, validity, revocation and
//!   attest key delegation, together with the kind of root it ends in
//! * Requesting attestation key certificates from the remote key
//!   provisioning server
//!
//! See the Android [key attestation] documentation for the format.
//!
//! [key attestation]: https://source.android.com/docs/security/features/keystore/attestation

pub mod attestation;
pub mod chain;
pub mod keystore;
pub mod rkp;
pub mod store;

#[cfg(test)]
mod testutil;
