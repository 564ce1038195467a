// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

//! The attestation module decodes the key attestation carried by an X.509
//! certificate into an [`AttestationRecord`].
//!
//! Three extension formats are understood: the ASN.1 key description, the
//! CBOR Entity Attestation Token and the Samsung Knox extension that builds
//! on the former.  Authorization lists of both encodings share one tag space
//! (see [`Tag`]) and decode into the same [`AuthorizationList`].
//!
//! # Example
//!
//! ```
//! use keyattestation::attestation::{AttestationRecord, SecurityLevel};
//!
//! const chain: &[u8] = include_bytes!("../../testdata/chain-standard.der");
//!
//! // the leaf is the first certificate in the concatenation
//! let (rest, _) = x509_parser::parse_x509_certificate(chain).expect("parsing leaf");
//! let leaf = &chain[..chain.len() - rest.len()];
//!
//! let r = AttestationRecord::from_certificate(leaf).expect("decoding attestation");
//!
//! assert_eq!(r.challenge(), b"test-challenge");
//! assert_eq!(r.keymint_security_level(), SecurityLevel::TrustedEnvironment);
//! ```

pub use self::appid::{AttestationApplicationId, PackageInfo};
pub use self::authorization::AuthorizationList;
pub use self::eat::EatRecord;
pub use self::errors::DecodeError;
pub use self::extensions::*;
pub use self::provisioning::ProvisioningInfo;
pub use self::record::{AttestationRecord, KeyDescription, SecurityLevel, KM_PURPOSE_ATTEST_KEY};
pub use self::rootoftrust::{eat_boot_state, RootOfTrust, VerifiedBootState};
pub use self::tags::Tag;
pub use self::vendor::{AuthResult, IntegrityStatus, Status, VendorRecord};

pub mod names;

mod appid;
mod authorization;
mod common;
mod eat;
mod errors;
mod extensions;
mod provisioning;
mod record;
mod rootoftrust;
mod tags;
mod vendor;
