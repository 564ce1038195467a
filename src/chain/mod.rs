// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

//! Certificate chain loading and trust evaluation.
//!
//! A chain is walked from its root to its leaf.  Each certificate has its
//! signature checked against its parent, its serial looked up in the
//! revocation list and its validity period checked, and its attestation
//! decoded.  The root key is classified against the known roots in the
//! [`TrustContext`].
//!
//! # Example
//!
//! ```
//! use keyattestation::chain::{evaluate, CertStatus, CertificateChain, TrustContext};
//! use keyattestation::store::IssuerKind;
//!
//! const CHAIN: &[u8] = include_bytes!("../../testdata/chain-standard.pem");
//!
//! let chain = CertificateChain::load(CHAIN).expect("loading chain");
//! let ctx: TrustContext = TrustContext::default();
//!
//! let e = evaluate(&chain, &ctx).expect("evaluating chain");
//!
//! assert_eq!(e.worst_status(), CertStatus::Normal);
//! assert_eq!(e.issuer, IssuerKind::Unknown);
//! ```

pub use self::certificate::{Certificate, CertificateChain};
pub use self::errors::{Error, TrustError};
pub use self::evaluation::{
    chain_issuer, evaluate, evaluate_at, CertStatus, CertificateEvaluation, ChainEvaluation,
    TrustContext,
};

mod certificate;
mod errors;
mod evaluation;
