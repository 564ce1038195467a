// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::certificate::{Certificate, CertificateChain};
use super::errors::{Error, TrustError};
use crate::attestation::{
    AttestationRecord, DecodeError, ProvisioningInfo, RootOfTrust, SecurityLevel,
};
use crate::store::{
    IRevocationStore, IssuerKind, MemoRevocationStore, RevocationEntry, RootKeyStore,
};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;

/// How far a certificate got through the checks, which run in this order:
/// signature, revocation, validity.  A certificate stuck at `Sign` failed
/// its signature check, and so on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CertStatus {
    #[default]
    Unknown,
    Sign,
    Revoked,
    Expired,
    Normal,
}

/// What a chain is evaluated against: the revocation status list and the
/// known root keys.  Built once by the caller and shared between
/// evaluations.
#[derive(Debug, Default)]
pub struct TrustContext<R: IRevocationStore = MemoRevocationStore> {
    pub revocation: R,
    pub roots: RootKeyStore,
}

impl<R: IRevocationStore> TrustContext<R> {
    pub fn new(revocation: R, roots: RootKeyStore) -> Self {
        Self { revocation, roots }
    }
}

/// The outcome of the checks on one certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CertificateEvaluation {
    pub serial: String,
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Only set on the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_kind: Option<IssuerKind>,
    pub status: CertStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TrustError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RevocationEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<AttestationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<DecodeError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_info: Option<ProvisioningInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unexpected_extensions: Vec<String>,
}

impl CertificateEvaluation {
    fn new(c: &Certificate) -> Self {
        Self {
            serial: c.serial().to_string(),
            subject: c.subject().to_string(),
            issuer: c.issuer().to_string(),
            not_before: c.not_before(),
            not_after: c.not_after(),
            issuer_kind: None,
            status: CertStatus::Unknown,
            error: None,
            revocation: None,
            record: None,
            decode_error: None,
            provisioning_info: None,
            unexpected_extensions: c
                .extensions()
                .unexpected_oids()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    fn check_status(
        &mut self,
        c: &Certificate,
        parent: &Certificate,
        revocation: &impl IRevocationStore,
        at: DateTime<Utc>,
    ) -> Result<(), TrustError> {
        self.status = CertStatus::Sign;
        c.verify(parent)?;

        self.status = CertStatus::Revoked;
        if let Some(e) = revocation.lookup(c.serial()) {
            let msg = format!("serial {} is {:?}, reason {:?}", c.serial(), e.status, e.reason);
            self.revocation = Some(e);
            return Err(TrustError::Revoked(msg));
        }

        self.status = CertStatus::Expired;
        c.check_validity(at)?;

        self.status = CertStatus::Normal;

        Ok(())
    }

    // Returns whether the walk has to stop here: a key that may sign
    // arbitrary data vouches for nothing below it.
    fn check_attestation(&mut self, c: &Certificate) -> bool {
        self.provisioning_info = ProvisioningInfo::from_extensions(c.extensions());

        match AttestationRecord::from_extensions(c.extensions()) {
            Ok(r) => {
                let stop = !r.can_attest_keys();
                self.record = Some(r);
                stop
            }
            Err(e) => {
                debug!("certificate {}: {e}", self.serial);
                self.decode_error = Some(e);
                false
            }
        }
    }
}

/// The outcome of walking a certificate chain from its root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainEvaluation {
    /// Root first, up to where the walk stopped
    pub certificates: Vec<CertificateEvaluation>,
    pub issuer: IssuerKind,
    /// The deepest attestation record that decoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<AttestationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_of_trust: Option<RootOfTrust>,
    pub software_level: bool,
    pub revocation_available: bool,
}

impl ChainEvaluation {
    fn new(certificates: Vec<CertificateEvaluation>, revocation_available: bool) -> Self {
        let issuer = chain_issuer(&certificates);

        let record = certificates.iter().rev().find_map(|c| c.record.clone());
        let root_of_trust = record.as_ref().and_then(|r| r.root_of_trust().cloned());
        let software_level = !matches!(
            record.as_ref().and_then(|r| r.attestation_security_level()),
            Some(SecurityLevel::TrustedEnvironment | SecurityLevel::StrongBox)
        );

        Self {
            certificates,
            issuer,
            record,
            root_of_trust,
            software_level,
            revocation_available,
        }
    }

    /// The lowest status reached by any certificate
    pub fn worst_status(&self) -> CertStatus {
        self.certificates
            .iter()
            .map(|c| c.status)
            .min()
            .unwrap_or_default()
    }

    /// The record of the last certificate walked, or the reason it could
    /// not be decoded.
    pub fn leaf_record(&self) -> Result<&AttestationRecord, DecodeError> {
        let last = self
            .certificates
            .last()
            .ok_or(DecodeError::NoAttestationExtension)?;

        match (&last.record, &last.decode_error) {
            (Some(r), _) => Ok(r),
            (None, Some(e)) => Err(e.clone()),
            (None, None) => Err(DecodeError::NoAttestationExtension),
        }
    }
}

/// Chain level issuer: the root's kind, unless some certificate failed its
/// signature or revocation check.  A Google chain whose first certificate
/// below the Google LLC ones carries provisioning info was issued through
/// remote provisioning.
pub fn chain_issuer(certs: &[CertificateEvaluation]) -> IssuerKind {
    let Some(root) = certs.first() else {
        return IssuerKind::Null;
    };

    if certs.iter().any(|c| c.status < CertStatus::Expired) {
        return IssuerKind::Failed;
    }

    let kind = root.issuer_kind.unwrap_or(IssuerKind::Unknown);

    if kind == IssuerKind::Google {
        if let Some(c) = certs[1..].iter().find(|c| !c.subject.contains("Google LLC")) {
            if c.provisioning_info.is_some() {
                return IssuerKind::GoogleRkp;
            }
        }
    }

    kind
}

/// Evaluate `chain` as of now
pub fn evaluate<R: IRevocationStore>(
    chain: &CertificateChain,
    ctx: &TrustContext<R>,
) -> Result<ChainEvaluation, Error> {
    evaluate_at(chain, ctx, Utc::now())
}

/// Walk `chain` from the root towards the leaf.  Every certificate is
/// checked against its parent, the root against itself.  The walk stops
/// after a certificate whose attestation does not allow attesting other
/// keys.  Per certificate failures are recorded, not returned.
pub fn evaluate_at<R: IRevocationStore>(
    chain: &CertificateChain,
    ctx: &TrustContext<R>,
    at: DateTime<Utc>,
) -> Result<ChainEvaluation, Error> {
    let certs = chain.root_first();

    let Some(root) = certs.first().copied() else {
        return Err(Error::EmptyChain);
    };

    let mut parent = root;
    let mut evals = Vec::with_capacity(certs.len());

    for c in certs {
        let mut ev = CertificateEvaluation::new(c);

        if let Err(e) = ev.check_status(c, parent, &ctx.revocation, at) {
            ev.error = Some(e);
        }

        if std::ptr::eq(c, root) {
            ev.issuer_kind = Some(ctx.roots.classify(c.spki()));
        } else {
            parent = c;
        }

        let stop = ev.check_attestation(c);

        debug!("certificate {}: {:?}", ev.serial, ev.status);

        evals.push(ev);

        if stop {
            break;
        }
    }

    let result = ChainEvaluation::new(evals, ctx.revocation.is_available());

    info!(
        "chain of {} evaluated, walked {}, issuer {:?}",
        chain.len(),
        result.certificates.len(),
        result.issuer
    );

    Ok(result)
}
