// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::revocation::RevocationEntry;

/// Interface to the store where the revocation status of attestation
/// certificates is kept.
pub trait IRevocationStore {
    /// Lookup the status of a certificate given its serial number in hex
    fn lookup(&self, serial: &str) -> Option<RevocationEntry>;

    /// Whether revocation data has been loaded at all.  A lookup miss on an
    /// unavailable store means "unknown", not "not revoked".
    fn is_available(&self) -> bool;
}
