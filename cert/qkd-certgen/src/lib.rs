// Copyright (c) Microsoft. All rights reserved.

//! Issues a self-signed X.509 identity whose Ed25519 key is derived from a key delivered by a QKD KME.
//!
//! Both ends of a QKD link receive the same key from their KMEs, so both can derive the same key pair
//! independently. The KME key ID is returned with the identity; requesting that ID again in decryption mode
//! reproduces the same key pair.

#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod derive;
pub use derive::{derive, DerivedIdentity};

pub mod dn;
pub use dn::DistinguishedName;

mod error;
pub use error::{CertError, IssuanceError, SeedError};

pub mod pem;

pub mod seed;
pub use seed::{ValidatedSeed, ED25519_SEED_LEN};

/// An identity together with the ID of the KME key it was derived from.
#[derive(Debug)]
pub struct IssuedIdentity {
    pub key_id: String,
    pub identity: DerivedIdentity,
}

/// Retrieves one key from the KME and derives an identity from it.
///
/// The client's configured mode is used as-is: without a key ID the KME hands out a fresh key, with one it
/// returns that specific key.
pub fn issue_certificate(
    client: &kme_client::Client,
    subject: Option<&DistinguishedName>,
    validity_days: u32,
) -> Result<IssuedIdentity, IssuanceError> {
    if validity_days == 0 {
        return Err(IssuanceError::InvalidValidity);
    }

    let key = client.retrieve()?;

    let key_bytes = zeroize::Zeroizing::new(key.decode_key().map_err(IssuanceError::DecodeKey)?);
    let seed = seed::validate(&key_bytes)?;

    let identity = derive(&seed, subject, validity_days)?;

    log::info!("derived identity from KME key {}", key.key_id);

    Ok(IssuedIdentity {
        key_id: key.key_id,
        identity,
    })
}
