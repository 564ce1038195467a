// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

/// Why a certificate did not reach the `Normal` status.  Recorded on the
/// certificate, never returned out of the walk.
#[derive(thiserror::Error, PartialEq, Eq, Clone)]
pub enum TrustError {
    #[error("Signature error: {0}")]
    Signature(String),
    #[error("Certificate revoked: {0}")]
    Revoked(String),
    #[error("Certificate expired: {0}")]
    Expired(String),
    #[error("Certificate not yet valid: {0}")]
    NotYetValid(String),
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl std::fmt::Debug for TrustError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustError::Signature(e)
            | TrustError::Revoked(e)
            | TrustError::Expired(e)
            | TrustError::NotYetValid(e)
            | TrustError::Crypto(e) => {
                write!(f, "{}", e)
            }
        }
    }
}

impl serde::Serialize for TrustError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("Empty certificate chain")]
    EmptyChain,
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Syntax(e) | Error::Crypto(e) => {
                write!(f, "{}", e)
            }
            Error::EmptyChain => write!(f, "{}", self),
        }
    }
}
