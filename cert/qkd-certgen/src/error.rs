// Copyright (c) Microsoft. All rights reserved.

#[derive(Debug)]
pub enum SeedError {
    WrongLength { expected: usize, actual: usize },
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedError::WrongLength { expected, actual } => write!(
                f,
                "key is {} bytes but an Ed25519 seed must be exactly {} bytes",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for SeedError {}

#[derive(Debug)]
pub enum CertError {
    Clock(std::time::SystemTimeError),
    InvalidValidity,
    Openssl(openssl::error::ErrorStack),
}

impl std::fmt::Display for CertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CertError::Clock(_) => f.write_str("system clock is set before the Unix epoch"),
            CertError::InvalidValidity => {
                f.write_str("certificate validity must be at least one day")
            }
            CertError::Openssl(_) => f.write_str("could not build the certificate"),
        }
    }
}

impl std::error::Error for CertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CertError::Clock(err) => Some(err),
            CertError::InvalidValidity => None,
            CertError::Openssl(err) => Some(err),
        }
    }
}

impl From<openssl::error::ErrorStack> for CertError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        CertError::Openssl(err)
    }
}

#[derive(Debug)]
pub enum IssuanceError {
    Cert(CertError),
    DecodeKey(base64::DecodeError),
    InvalidValidity,
    Retrieval(kme_client::RetrievalError),
    Seed(SeedError),
}

impl IssuanceError {
    pub fn category(&self) -> kme_common::ErrorCategory {
        match self {
            IssuanceError::InvalidValidity => kme_common::ErrorCategory::Configuration,
            IssuanceError::Retrieval(err) => err.category(),
            IssuanceError::Cert(_) | IssuanceError::DecodeKey(_) | IssuanceError::Seed(_) => {
                kme_common::ErrorCategory::Cryptographic
            }
        }
    }
}

impl std::fmt::Display for IssuanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssuanceError::Cert(_) => f.write_str("could not derive identity from key material"),
            IssuanceError::DecodeKey(_) => f.write_str("KME key is not valid base64"),
            IssuanceError::InvalidValidity => {
                f.write_str("certificate validity must be at least one day")
            }
            IssuanceError::Retrieval(_) => f.write_str("could not retrieve key from KME"),
            IssuanceError::Seed(_) => f.write_str("KME key is not a usable Ed25519 seed"),
        }
    }
}

impl std::error::Error for IssuanceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IssuanceError::Cert(err) => Some(err),
            IssuanceError::DecodeKey(err) => Some(err),
            IssuanceError::InvalidValidity => None,
            IssuanceError::Retrieval(err) => Some(err),
            IssuanceError::Seed(err) => Some(err),
        }
    }
}

impl From<kme_client::RetrievalError> for IssuanceError {
    fn from(err: kme_client::RetrievalError) -> Self {
        IssuanceError::Retrieval(err)
    }
}

impl From<SeedError> for IssuanceError {
    fn from(err: SeedError) -> Self {
        IssuanceError::Seed(err)
    }
}

impl From<CertError> for IssuanceError {
    fn from(err: CertError) -> Self {
        IssuanceError::Cert(err)
    }
}
