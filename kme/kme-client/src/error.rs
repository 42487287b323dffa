// Copyright (c) Microsoft. All rights reserved.

#[derive(Debug)]
pub enum TransportError {
    /// The KME answered with something other than `200 OK`.
    BadStatus(u16),
    InvalidCredential(Box<dyn std::error::Error + Send + Sync>),
    InvalidTrustBundle(std::path::PathBuf, openssl::error::ErrorStack),
    MalformedResponse(Box<dyn std::error::Error + Send + Sync>),
    Network(std::io::Error),
    Timeout(std::time::Duration),
}

impl TransportError {
    pub fn category(&self) -> kme_common::ErrorCategory {
        match self {
            TransportError::BadStatus(_) | TransportError::MalformedResponse(_) => {
                kme_common::ErrorCategory::Protocol
            }
            TransportError::InvalidTrustBundle(..) => kme_common::ErrorCategory::Configuration,
            TransportError::InvalidCredential(_)
            | TransportError::Network(_)
            | TransportError::Timeout(_) => kme_common::ErrorCategory::Transport,
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::BadStatus(status) => {
                write!(f, "KME API returned non-200 status {}", status)
            }
            TransportError::InvalidCredential(_) => {
                f.write_str("client certificate and private key could not be loaded as a pair")
            }
            TransportError::InvalidTrustBundle(path, _) => {
                write!(f, "could not load trust bundle {}", path.display())
            }
            TransportError::MalformedResponse(_) => f.write_str("malformed HTTP response"),
            TransportError::Network(_) => f.write_str("could not communicate with the KME"),
            TransportError::Timeout(timeout) => {
                write!(f, "KME did not respond within {:?}", timeout)
            }
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        #[allow(clippy::match_same_arms)]
        match self {
            TransportError::BadStatus(_) | TransportError::Timeout(_) => None,
            TransportError::InvalidCredential(err) => Some(&**err),
            TransportError::InvalidTrustBundle(_, err) => Some(err),
            TransportError::MalformedResponse(err) => Some(&**err),
            TransportError::Network(err) => Some(err),
        }
    }
}

#[derive(Debug)]
pub enum ProtocolError {
    KeyIdMismatch { expected: String, got: String },
    Malformed(Box<dyn std::error::Error + Send + Sync>),
    UnexpectedKeyCount(usize),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::KeyIdMismatch { expected, got } => write!(
                f,
                "KME returned key ID not matching the requested key ID [expected: {}, got: {}]",
                expected, got
            ),
            ProtocolError::Malformed(_) => f.write_str("KME response is not a valid key container"),
            ProtocolError::UnexpectedKeyCount(count) => {
                write!(f, "KME returned {} keys but exactly one was requested", count)
            }
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Malformed(err) => Some(&**err),
            ProtocolError::KeyIdMismatch { .. } | ProtocolError::UnexpectedKeyCount(_) => None,
        }
    }
}

#[derive(Debug)]
pub enum RetrievalError {
    Protocol(ProtocolError),
    Transport(TransportError),
}

impl RetrievalError {
    pub fn category(&self) -> kme_common::ErrorCategory {
        match self {
            RetrievalError::Protocol(_) => kme_common::ErrorCategory::Protocol,
            RetrievalError::Transport(err) => err.category(),
        }
    }
}

impl std::fmt::Display for RetrievalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalError::Protocol(_) => f.write_str("KME returned an unusable response"),
            RetrievalError::Transport(_) => f.write_str("KME request failed"),
        }
    }
}

impl std::error::Error for RetrievalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RetrievalError::Protocol(err) => Some(err),
            RetrievalError::Transport(err) => Some(err),
        }
    }
}

impl From<ProtocolError> for RetrievalError {
    fn from(err: ProtocolError) -> Self {
        RetrievalError::Protocol(err)
    }
}

impl From<TransportError> for RetrievalError {
    fn from(err: TransportError) -> Self {
        RetrievalError::Transport(err)
    }
}
