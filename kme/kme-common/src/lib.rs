// Copyright (c) Microsoft. All rights reserved.

#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod config;
pub use config::{ConfigError, Credentials, EndpointConfig, KeyMode, DEFAULT_TIMEOUT};

/// Coarse classification of a failure, used to tell operators which side needs fixing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCategory {
    /// Invalid or missing caller-supplied settings. Nothing was sent.
    Configuration,

    /// The KME could not be reached, or the client credentials could not be used.
    Transport,

    /// The KME answered outside the expected contract.
    Protocol,

    /// The key material could not be turned into an identity.
    Cryptographic,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Transport => "transport",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Cryptographic => "cryptographic",
        })
    }
}

/// A key as returned by the KME.
#[derive(Clone, Eq, PartialEq)]
pub struct KeyMaterial {
    pub key_id: String,

    /// Base64-encoded key bytes, exactly as they appeared on the wire.
    pub key: String,
}

impl KeyMaterial {
    pub fn decode_key(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &self.key)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}
