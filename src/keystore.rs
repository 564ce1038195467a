// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

//! The platform keystore, as seen from the attestation side: something that
//! generates attested keys and hands out their certificate chains.

use crate::attestation::KM_PURPOSE_ATTEST_KEY;
use crate::chain::{self, CertificateChain, ChainEvaluation, TrustContext};
use crate::store::IRevocationStore;
use chrono::{SecondsFormat, Utc};
use log::{debug, info};

const KM_PURPOSE_SIGN: i64 = 2;

#[derive(thiserror::Error, PartialEq, Eq, Clone)]
pub enum PlatformError {
    #[error("StrongBox unavailable: {0}")]
    StrongBoxUnavailable(String),
    #[error("Device IDs unavailable: {0}")]
    DeviceIdsUnavailable(String),
    #[error("Attestation keys not provisioned: {0}")]
    KeysNotProvisioned(String),
    #[error("Keystore unavailable: {0}")]
    Unavailable(String),
}

impl std::fmt::Debug for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::StrongBoxUnavailable(e)
            | PlatformError::DeviceIdsUnavailable(e)
            | PlatformError::KeysNotProvisioned(e)
            | PlatformError::Unavailable(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
    #[error("No certificate chain for {0}")]
    MissingChain(String),
    #[error("Chain error: {0}")]
    Chain(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Platform(e) => write!(f, "{:?}", e),
            Error::MissingChain(e) | Error::Chain(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

/// What to ask of the keystore when generating a P-256 key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyGenParams {
    pub alias: String,
    pub challenge: Vec<u8>,
    /// `KM_PURPOSE_ATTEST_KEY` for attestation keys, signing otherwise
    pub purpose: i64,
    /// Key to sign the attestation with, instead of the factory key
    pub attest_key_alias: Option<String>,
    pub use_strongbox: bool,
    pub include_device_props: bool,
    pub unique_id_included: bool,
    /// Attestation id tags, e.g. 713 for the serial number
    pub attestation_ids: Vec<i64>,
}

impl KeyGenParams {
    /// Parameters for a signing key, challenged with the current time
    pub fn new(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            challenge: Utc::now()
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .into_bytes(),
            purpose: KM_PURPOSE_SIGN,
            attest_key_alias: None,
            use_strongbox: false,
            include_device_props: false,
            unique_id_included: false,
            attestation_ids: vec![],
        }
    }

    pub fn with_attest_key(mut self, alias: &str) -> Self {
        self.attest_key_alias = Some(alias.to_string());
        self
    }

    pub fn is_attest_key(&self) -> bool {
        self.purpose == KM_PURPOSE_ATTEST_KEY
    }

    // the attestation key the signing key is certified by
    fn attest_key(&self, alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            purpose: KM_PURPOSE_ATTEST_KEY,
            attest_key_alias: None,
            ..self.clone()
        }
    }
}

pub trait KeyStore {
    /// Generate a key and return its certificate chain, leaf first
    fn generate_key(&self, params: &KeyGenParams) -> Result<CertificateChain, PlatformError>;

    fn get_certificate_chain(&self, alias: &str) -> Option<CertificateChain>;
}

/// A freshly attested key: the chain the keystore returned for it and the
/// evaluation of that chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attested {
    pub chain: CertificateChain,
    pub evaluation: ChainEvaluation,
}

/// Generate the key described by `params` and evaluate its attestation.
///
/// When an attest key is asked for and the keystore has none under that
/// alias yet, it is generated first.  The attest key's own chain is appended
/// to the key's, which then ends at the attest key certificate.
pub fn attest<R: IRevocationStore>(
    store: &dyn KeyStore,
    params: &KeyGenParams,
    ctx: &TrustContext<R>,
) -> Result<Attested, Error> {
    if let Some(ak) = &params.attest_key_alias {
        if store.get_certificate_chain(ak).is_none() {
            debug!("generating attest key {ak}");
            store.generate_key(&params.attest_key(ak))?;
        }
    }

    let key_chain = store.generate_key(params)?;

    let mut certs = key_chain.certificates().to_vec();

    if let Some(ak) = &params.attest_key_alias {
        let ak_chain = store
            .get_certificate_chain(ak)
            .ok_or_else(|| Error::MissingChain(ak.clone()))?;
        certs.extend_from_slice(ak_chain.certificates());
    }

    let chain = CertificateChain::new(certs);

    let evaluation = chain::evaluate(&chain, ctx).map_err(|e| Error::Chain(e.to_string()))?;

    info!(
        "attested {} with a chain of {} certificates, issuer {:?}",
        params.alias,
        chain.len(),
        evaluation.issuer
    );

    Ok(Attested { chain, evaluation })
}
