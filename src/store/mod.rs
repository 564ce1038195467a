// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

//! Trust material consulted while evaluating a chain: the revocation status
//! list and the set of known root public keys.

pub use self::errors::Error;
pub use self::irevocationstore::IRevocationStore;
pub use self::memo_revocationstore::{MemoRevocationStore, RevocationSource, DEFAULT_STATUS_URL};
pub use self::revocation::{RevocationEntry, RevocationReason, RevocationStatus};
pub use self::rootkeys::{IssuerKind, RootKeyStore};

mod errors;
mod irevocationstore;
mod memo_revocationstore;
mod revocation;
mod rootkeys;
