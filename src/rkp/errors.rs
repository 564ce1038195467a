// Copyright 2024 Contributors to the keyattestation project.
// SPDX-License-Identifier: Apache-2.0

#[derive(thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Device not registered")]
    NotRegistered,
    #[error("Server error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("Device error: {0}")]
    Device(String),
}

impl ProtocolError {
    /// Whether trying again later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProtocolError::Network(_))
    }
}

impl std::fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::Network(e)
            | ProtocolError::MalformedResponse(e)
            | ProtocolError::Device(e) => {
                write!(f, "{}", e)
            }
            ProtocolError::NotRegistered | ProtocolError::Server { .. } => {
                write!(f, "{}", self)
            }
        }
    }
}
