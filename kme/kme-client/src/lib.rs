// Copyright (c) Microsoft. All rights reserved.

//! Client for the `enc_keys` / `dec_keys` key-delivery API of a KME.
//!
//! ```no_run
//! let config = kme_common::EndpointConfig::new(
//!     "https://kme.example/",
//!     "CONS_TIM_UPT",
//!     kme_common::Credentials::Files {
//!         cert: "client.crt".into(),
//!         key: "client.key".into(),
//!     },
//!     None,
//! )?;
//! let key = kme_client::Client::new(config).retrieve()?;
//! println!("{}", key.key_id);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod error;
pub use error::{ProtocolError, RetrievalError, TransportError};

pub mod request;
pub use request::KeyRequest;

pub mod response;

pub mod transport;

/// Retrieves keys from one KME endpoint.
///
/// Every call to [`Client::retrieve`] makes exactly one request; nothing is cached between calls.
pub struct Client {
    config: kme_common::EndpointConfig,
}

impl Client {
    pub fn new(config: kme_common::EndpointConfig) -> Self {
        Client { config }
    }

    pub fn config(&self) -> &kme_common::EndpointConfig {
        &self.config
    }

    pub fn retrieve(&self) -> Result<kme_common::KeyMaterial, RetrievalError> {
        let request = request::build(&self.config);

        if self.config.debug() {
            log::debug!("QKD API URL: {}", request.url);
            log::debug!("QKD SAE: {}", self.config.sae());
            log::debug!(
                "QKD key ID: {}",
                self.config.key_mode().key_id().unwrap_or("<none>")
            );
            log::debug!("TLS options: {:?}", self.config.credentials());
            if let Some(body) = &request.body {
                log::debug!("request data: {}", String::from_utf8_lossy(body));
            }
        }

        let body = transport::send(&self.config, &request)?;
        let key = response::validate(&body, self.config.key_mode())?;

        if self.config.debug() {
            log::debug!("KME returned key ID: {}", key.key_id);
        }

        Ok(key)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.config.base_url())
            .field("sae", &self.config.sae())
            .finish_non_exhaustive()
    }
}
