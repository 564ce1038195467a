// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

#[derive(thiserror::Error, PartialEq, Eq, Clone)]
pub enum DecodeError {
    #[error("Syntax error: {0}")]
    Syntax(String),
    #[error("Unknown tag: {0}")]
    UnknownTag(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Malformed structure: {0}")]
    Malformed(String),
    #[error("Duplicated tag: {0}")]
    DuplicatedTag(String),
    #[error("Missing extension: {0}")]
    MissingExtension(String),
    #[error("No attestation extension found")]
    NoAttestationExtension,
    #[error("Multiple attestation extensions found")]
    MultipleAttestationExtensions,
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl std::fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Syntax(e)
            | DecodeError::UnknownTag(e)
            | DecodeError::TypeMismatch(e)
            | DecodeError::Malformed(e)
            | DecodeError::DuplicatedTag(e)
            | DecodeError::MissingExtension(e)
            | DecodeError::InvariantViolation(e) => {
                write!(f, "{}", e)
            }
            DecodeError::NoAttestationExtension | DecodeError::MultipleAttestationExtensions => {
                write!(f, "{}", self)
            }
        }
    }
}

impl serde::Serialize for DecodeError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
