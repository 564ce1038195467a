// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

use super::errors::{Error, TrustError};
use crate::attestation::{Extension, Extensions};
use chrono::{DateTime, Utc};
use cms::cert::CertificateChoices;
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{CertificateSet, EncapsulatedContentInfo, SignedData, SignerInfos};
use der::asn1::SetOfVec;
use der::oid::ObjectIdentifier;
use der::{Any, Decode, Encode};
use log::debug;
use openssl::pkcs7::Pkcs7;
use openssl::x509::X509;

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");

/// One X.509 certificate, with the fields the trust walk needs pulled out
/// up front.
#[derive(Clone, Debug)]
pub struct Certificate {
    der: Vec<u8>,
    x509: X509,
    serial: String,
    subject: String,
    issuer: String,
    subject_raw: Vec<u8>,
    issuer_raw: Vec<u8>,
    spki: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    extensions: Extensions,
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

fn timestamp(t: &x509_parser::time::ASN1Time) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp(t.timestamp(), 0)
        .ok_or_else(|| Error::Syntax(format!("validity time out of range: {}", t.timestamp())))
}

impl Certificate {
    /// Parse exactly one DER encoded certificate
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let (rest, c) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| Error::Syntax(format!("certificate: {e}")))?;

        if !rest.is_empty() {
            return Err(Error::Syntax(format!(
                "{} trailing bytes after certificate",
                rest.len()
            )));
        }

        let x509 = X509::from_der(der).map_err(|e| Error::Crypto(e.to_string()))?;

        let extensions = Extensions::new(
            c.extensions()
                .iter()
                .map(|e| Extension {
                    oid: e.oid.to_id_string(),
                    critical: e.critical,
                    value: e.value.to_vec(),
                })
                .collect(),
        );

        Ok(Self {
            der: der.to_vec(),
            x509,
            serial: c.tbs_certificate.serial.to_str_radix(16),
            subject: c.subject().to_string(),
            issuer: c.issuer().to_string(),
            subject_raw: c.subject().as_raw().to_vec(),
            issuer_raw: c.issuer().as_raw().to_vec(),
            spki: c.public_key().raw.to_vec(),
            not_before: timestamp(&c.validity().not_before)?,
            not_after: timestamp(&c.validity().not_after)?,
            extensions,
        })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Serial number in lowercase hex, without leading zeros
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// DER SubjectPublicKeyInfo
    pub fn spki(&self) -> &[u8] {
        &self.spki
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn is_self_issued(&self) -> bool {
        self.subject_raw == self.issuer_raw
    }

    /// Whether `parent`'s subject is this certificate's issuer
    pub fn is_issued_by(&self, parent: &Certificate) -> bool {
        self.issuer_raw == parent.subject_raw
    }

    /// Check the signature against the public key of `parent`
    pub fn verify(&self, parent: &Certificate) -> Result<(), TrustError> {
        let key = parent
            .x509
            .public_key()
            .map_err(|e| TrustError::Crypto(e.to_string()))?;

        match self.x509.verify(&key) {
            Ok(true) => Ok(()),
            Ok(false) => Err(TrustError::Signature(format!(
                "not signed by the key of {}",
                parent.subject
            ))),
            Err(e) => Err(TrustError::Signature(e.to_string())),
        }
    }

    pub fn check_validity(&self, at: DateTime<Utc>) -> Result<(), TrustError> {
        if at < self.not_before {
            return Err(TrustError::NotYetValid(format!(
                "valid from {}",
                self.not_before.to_rfc3339()
            )));
        }

        if at > self.not_after {
            return Err(TrustError::Expired(format!(
                "valid until {}",
                self.not_after.to_rfc3339()
            )));
        }

        Ok(())
    }
}

/// A certificate chain in the order it was supplied, normally leaf first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CertificateChain {
    certs: Vec<Certificate>,
}

impl CertificateChain {
    pub fn new(certs: Vec<Certificate>) -> Self {
        Self { certs }
    }

    /// Load a chain from concatenated DER certificates, a PEM bundle or a
    /// PKCS#7 SignedData envelope (DER or PEM), trying them in that order.
    pub fn load(buf: &[u8]) -> Result<Self, Error> {
        Self::from_der(buf)
            .or_else(|e| {
                debug!("not a DER certificate sequence: {e:?}");
                Self::from_pem(buf)
            })
            .or_else(|e| {
                debug!("not a PEM certificate bundle: {e:?}");
                Self::from_pkcs7(buf)
            })
    }

    /// Split a concatenation of DER certificates using their own length
    /// framing
    pub fn from_der(buf: &[u8]) -> Result<Self, Error> {
        let mut certs = vec![];
        let mut rest = buf;

        while !rest.is_empty() {
            let (r, _) = x509_parser::parse_x509_certificate(rest)
                .map_err(|e| Error::Syntax(format!("certificate {}: {e}", certs.len())))?;

            let der = &rest[..rest.len() - r.len()];
            certs.push(Certificate::from_der(der)?);
            rest = r;
        }

        if certs.is_empty() {
            return Err(Error::Syntax("no certificate found".to_string()));
        }

        Ok(Self { certs })
    }

    pub fn from_pem(buf: &[u8]) -> Result<Self, Error> {
        let stack = X509::stack_from_pem(buf).map_err(|e| Error::Syntax(e.to_string()))?;

        if stack.is_empty() {
            return Err(Error::Syntax("no certificate found in PEM".to_string()));
        }

        let certs = stack
            .iter()
            .map(|c| {
                let der = c.to_der().map_err(|e| Error::Crypto(e.to_string()))?;
                Certificate::from_der(&der)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { certs })
    }

    pub fn from_pkcs7(buf: &[u8]) -> Result<Self, Error> {
        let p7 = Pkcs7::from_der(buf)
            .or_else(|_| Pkcs7::from_pem(buf))
            .map_err(|e| Error::Syntax(format!("PKCS#7: {e}")))?;

        let stack = p7
            .signed()
            .and_then(|s| s.certificates())
            .ok_or_else(|| Error::Syntax("PKCS#7 without certificates".to_string()))?;

        let certs = stack
            .iter()
            .map(|c| {
                let der = c.to_der().map_err(|e| Error::Crypto(e.to_string()))?;
                Certificate::from_der(&der)
            })
            .collect::<Result<Vec<_>, _>>()?;

        if certs.is_empty() {
            return Err(Error::Syntax("PKCS#7 without certificates".to_string()));
        }

        Ok(Self { certs })
    }

    /// Encode the chain as a DER PKCS#7 certs-only SignedData.  The
    /// certificates end up in DER set order, not in chain order.
    pub fn to_pkcs7(&self) -> Result<Vec<u8>, Error> {
        let der_err = |e: der::Error| Error::Syntax(format!("PKCS#7: {e}"));

        let certs = self
            .certs
            .iter()
            .map(|c| x509_cert::Certificate::from_der(&c.der).map(CertificateChoices::Certificate))
            .collect::<Result<Vec<_>, _>>()
            .map_err(der_err)?;

        let sd = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: SetOfVec::new(),
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: ID_DATA,
                econtent: None,
            },
            certificates: Some(CertificateSet(SetOfVec::try_from(certs).map_err(der_err)?)),
            crls: None,
            signer_infos: SignerInfos(SetOfVec::new()),
        };

        ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::encode_from(&sd).map_err(der_err)?,
        }
        .to_der()
        .map_err(der_err)
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certs
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    pub fn leaf(&self) -> Option<&Certificate> {
        self.certs.first()
    }

    /// The certificates ordered from the root to the leaf.
    ///
    /// A chain supplied leaf first with matching issuer and subject names is
    /// simply reversed.  Otherwise the names are used to sort it; when that
    /// is ambiguous the supplied order is kept, reversed, and the signature
    /// checks will flag the mismatch.
    pub fn root_first(&self) -> Vec<&Certificate> {
        let consistent = self.certs.windows(2).all(|w| w[0].is_issued_by(&w[1]));

        if !consistent {
            if let Some(sorted) = self.sort_by_names() {
                return sorted;
            }
            debug!("cannot order the chain by names, keeping the supplied order");
        }

        self.certs.iter().rev().collect()
    }

    fn sort_by_names(&self) -> Option<Vec<&Certificate>> {
        let mut roots = self.certs.iter().filter(|c| {
            c.is_self_issued()
                || !self
                    .certs
                    .iter()
                    .any(|p| !std::ptr::eq(*c, p) && c.is_issued_by(p))
        });

        let root = roots.next()?;
        if roots.next().is_some() {
            return None;
        }

        let mut sorted = vec![root];

        while sorted.len() < self.certs.len() {
            let parent = sorted[sorted.len() - 1];

            let mut children = self.certs.iter().filter(|c| {
                c.is_issued_by(parent) && !sorted.iter().any(|s| std::ptr::eq(*s, *c))
            });

            let child = children.next()?;
            if children.next().is_some() {
                return None;
            }

            sorted.push(child);
        }

        Some(sorted)
    }
}
